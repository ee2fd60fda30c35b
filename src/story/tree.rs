//! Fragment forest, cursor, and context building.

use std::collections::HashMap;

use crate::api::{ApiError, CompletionClient, Model, Tokenizer};

use super::{GenerationParams, TreeError};

/// Where a fragment's content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentOrigin {
    /// The seed prompt; only fragment 0 has this origin.
    Prompt,
    /// A completion returned by the generation endpoint.
    Generated,
    /// A user edit replacing the content of earlier fragments.
    Edited {
        /// Ids of the fragments this edit replaces, in path order.
        targets: Vec<usize>,
    },
}

/// An immutable unit of story content.
///
/// Fragments live in an arena indexed by id; `prev` and `next` are arena
/// indices, so the forest has no ownership cycles (children always have
/// higher ids than their parent). Once created a fragment is never mutated
/// except to record new children in `next`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// Parent fragment id; `None` only for fragment 0.
    pub prev: Option<usize>,
    /// Child fragment ids, in creation order.
    pub next: Vec<usize>,
    /// Provenance of the content.
    pub origin: FragmentOrigin,
    /// The text itself.
    pub content: String,
}

/// A story's version tree: fragments plus a path/position cursor.
///
/// `path` is the currently selected branch from the root to a tip;
/// `position` is the cursor within it. The prefix `path[0..=position]` is
/// the active document; the suffix is the redo buffer. A new edit or
/// generation truncates that suffix before appending — abandoned tips stay
/// reachable through their parent's child list and [`StoryTree::choose`],
/// but the linear redo history is discarded.
///
/// Instances are single-writer: callers needing concurrency must serialize
/// access per story.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryTree {
    fragments: Vec<Fragment>,
    path: Vec<usize>,
    position: usize,
}

impl StoryTree {
    /// Create a tree with the seed prompt as fragment 0.
    pub fn new(prompt: impl Into<String>) -> Self {
        let root = Fragment {
            prev: None,
            next: Vec::new(),
            origin: FragmentOrigin::Prompt,
            content: prompt.into(),
        };
        StoryTree {
            fragments: vec![root],
            path: vec![0],
            position: 0,
        }
    }

    /// All fragments, indexed by id.
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The fragment with the given id, if any.
    pub fn fragment(&self, id: usize) -> Option<&Fragment> {
        self.fragments.get(id)
    }

    /// The full selected path, including any redo suffix.
    pub fn path(&self) -> &[usize] {
        &self.path
    }

    /// The cursor position within the path.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The id of the fragment under the cursor.
    pub fn current(&self) -> usize {
        self.path[self.position]
    }

    fn active_path(&self) -> &[usize] {
        &self.path[..=self.position]
    }

    /// Step the cursor back one fragment.
    pub fn undo(&mut self) -> Result<(), TreeError> {
        if self.position == 0 {
            return Err(TreeError::NothingToUndo);
        }
        self.position -= 1;
        Ok(())
    }

    /// Step the cursor forward one fragment along the selected path.
    pub fn redo(&mut self) -> Result<(), TreeError> {
        if self.position + 1 == self.path.len() {
            return Err(TreeError::NothingToRedo);
        }
        self.position += 1;
        Ok(())
    }

    /// Re-enter an existing branch: select the `index`-th child of the
    /// current tip and advance the cursor onto it.
    ///
    /// This is how a previously undone-and-replaced branch, or an
    /// alternative completion, is revisited. Returns the child's id.
    pub fn choose(&mut self, index: usize) -> Result<usize, TreeError> {
        let tip = self.path[self.position];
        let next = &self.fragments[tip].next;
        let children = next.len();
        let Some(&child) = next.get(index) else {
            return Err(TreeError::NoSuchBranch { index, children });
        };
        self.path.truncate(self.position + 1);
        self.path.push(child);
        self.position += 1;
        Ok(child)
    }

    /// Replace the character range `start..end` of the flattened document
    /// with `replacement`.
    ///
    /// The range must intersect at least one active fragment; an edit
    /// entirely outside the existing content fails with
    /// [`TreeError::EditOutOfRange`] and leaves the tree untouched. The
    /// edit keeps the unedited head of the first intersected fragment and
    /// the unedited tail of the last, splices `replacement` between them,
    /// and appends the result as a new `Edited` fragment targeting every
    /// intersected fragment. Returns the new fragment's id.
    pub fn edit(&mut self, start: usize, end: usize, replacement: &str) -> Result<usize, TreeError> {
        let mut targets = Vec::new();
        let mut head = String::new();
        let mut tail = String::new();

        let mut offset = 0usize;
        for (id, text) in self.emissions() {
            let len = text.chars().count();
            let (lo, hi) = (offset, offset + len);
            offset = hi;

            if start < hi && lo < end {
                if targets.is_empty() {
                    head = text.chars().take(start - lo).collect();
                }
                targets.push(id);
                if end <= hi {
                    tail = text.chars().skip(end - lo).collect();
                }
            }
            if hi >= end {
                break;
            }
        }

        if targets.is_empty() {
            return Err(TreeError::EditOutOfRange { start, end });
        }

        let content = format!("{head}{replacement}{tail}");
        Ok(self.push_fragment(FragmentOrigin::Edited { targets }, content))
    }

    /// Reconstruct the active document as a single string.
    ///
    /// Walks `path[0..=position]`; an `Edited` fragment emits its content
    /// in place of its first target and blanks the remaining targets, so
    /// the emission sequence keeps its positions while edited spans
    /// collapse to one emission.
    pub fn flatten(&self) -> String {
        self.emissions().into_iter().map(|(_, text)| text).collect()
    }

    /// Build a bounded token context from the tail of the document.
    ///
    /// Tokenizes a trailing character window, doubling it from
    /// `token_budget` until the tokenized tail reaches the budget or the
    /// window covers the whole document, then truncates to exactly the
    /// last `token_budget` tokens. This bounds re-tokenization work for
    /// long stories where only the tail is ever sent.
    pub fn build_context<T: Tokenizer>(
        &self,
        tokenizer: &T,
        model: Model,
        token_budget: usize,
    ) -> Vec<u32> {
        let content = self.flatten();
        let total_chars = content.chars().count();

        let mut window = token_budget;
        let mut tokens = Vec::new();
        while tokens.len() < token_budget {
            window = window.saturating_mul(2);
            tokens = tokenizer.encode(model, tail_chars(&content, window));
            if total_chars <= window {
                break;
            }
        }

        let excess = tokens.len().saturating_sub(token_budget);
        tokens.split_off(excess)
    }

    /// Request a completion and append it as a `Generated` fragment.
    ///
    /// Builds the context, calls the completion capability, and appends
    /// the first returned completion as a child of the current tip
    /// (truncating the redo suffix). Any failure — transport, API, or an
    /// empty completion list — propagates and leaves the tree exactly as
    /// it was. Returns the new fragment's id.
    pub async fn generate<C, T>(
        &mut self,
        completions: &C,
        tokenizer: &T,
        params: &GenerationParams,
    ) -> Result<usize, ApiError>
    where
        C: CompletionClient,
        T: Tokenizer,
    {
        let input = self.build_context(tokenizer, params.model, params.context_size);
        log::debug!("requesting completion with {} context tokens", input.len());

        let response = completions
            .draw_completions(
                &params.prefix_tokens,
                &input,
                params.model,
                params.module.as_deref(),
            )
            .await?;

        let Some(text) = response.completions.into_iter().next() else {
            return Err(ApiError::MalformedResponse(
                "completion response carried no completions".to_owned(),
            ));
        };

        Ok(self.push_fragment(FragmentOrigin::Generated, text))
    }

    /// Append a fragment as a child of the current tip, truncating the
    /// redo suffix first and advancing the cursor onto it.
    fn push_fragment(&mut self, origin: FragmentOrigin, content: String) -> usize {
        self.path.truncate(self.position + 1);
        let parent = self.path[self.position];

        let id = self.fragments.len();
        self.fragments.push(Fragment {
            prev: Some(parent),
            next: Vec::new(),
            origin,
            content,
        });
        self.fragments[parent].next.push(id);

        self.path.push(id);
        self.position = self.path.len() - 1;
        id
    }

    /// The active document as `(emitting fragment id, text)` slots.
    ///
    /// Each non-edited fragment opens a slot; an `Edited` fragment takes
    /// over its first target's slot and blanks the others. Later edits may
    /// target earlier edits, which resolve to the slot they occupy.
    fn emissions(&self) -> Vec<(usize, &str)> {
        let mut slots: Vec<(usize, &str)> = Vec::new();
        let mut slot_of: HashMap<usize, usize> = HashMap::new();

        for &id in self.active_path() {
            let fragment = &self.fragments[id];
            match &fragment.origin {
                FragmentOrigin::Edited { targets } => {
                    let Some(&slot) = targets.first().and_then(|t| slot_of.get(t)) else {
                        continue;
                    };
                    slots[slot] = (id, fragment.content.as_str());
                    slot_of.insert(id, slot);
                    for target in &targets[1..] {
                        if let Some(&blanked) = slot_of.get(target) {
                            if blanked != slot {
                                slots[blanked].1 = "";
                            }
                        }
                    }
                }
                _ => {
                    slot_of.insert(id, slots.len());
                    slots.push((id, fragment.content.as_str()));
                }
            }
        }
        slots
    }
}

/// The last `count` characters of `content`, on a char boundary.
fn tail_chars(content: &str, count: usize) -> &str {
    let total = content.chars().count();
    if total <= count {
        return content;
    }
    content
        .char_indices()
        .nth(total - count)
        .map(|(idx, _)| &content[idx..])
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::CompletionResponse;

    /// One token per character; enough to test windowing exactly.
    struct CharTokenizer;

    impl Tokenizer for CharTokenizer {
        fn encode(&self, _model: Model, text: &str) -> Vec<u32> {
            text.chars().map(|c| c as u32).collect()
        }

        fn decode(&self, _model: Model, tokens: &[u32]) -> String {
            tokens.iter().filter_map(|&t| char::from_u32(t)).collect()
        }
    }

    struct FixedCompletions(Vec<String>);

    impl CompletionClient for FixedCompletions {
        async fn draw_completions(
            &self,
            _prefix: &[u32],
            _input: &[u32],
            _model: Model,
            _module: Option<&str>,
        ) -> Result<CompletionResponse, ApiError> {
            Ok(CompletionResponse {
                completions: self.0.clone(),
            })
        }
    }

    struct BrokenCompletions;

    impl CompletionClient for BrokenCompletions {
        async fn draw_completions(
            &self,
            _prefix: &[u32],
            _input: &[u32],
            _model: Model,
            _module: Option<&str>,
        ) -> Result<CompletionResponse, ApiError> {
            Err(ApiError::Api {
                status: 500,
                message: "quota exceeded".to_owned(),
            })
        }
    }

    fn check_invariants(tree: &StoryTree) {
        assert_eq!(tree.path()[0], 0);
        for pair in tree.path().windows(2) {
            assert!(tree.fragment(pair[0]).unwrap().next.contains(&pair[1]));
        }
        assert!(tree.position() < tree.path().len());
    }

    #[test]
    fn new_tree_flattens_to_the_prompt() {
        let tree = StoryTree::new("Once upon a time");
        assert_eq!(tree.flatten(), "Once upon a time");
        assert_eq!(tree.current(), 0);
        check_invariants(&tree);
    }

    #[test]
    fn edit_replaces_a_range_within_one_fragment() {
        let mut tree = StoryTree::new("ABCDE");
        tree.edit(1, 3, "xy").unwrap();
        assert_eq!(tree.flatten(), "AxyDE");
        check_invariants(&tree);
    }

    #[test]
    fn edit_undo_redo_scenario() {
        let mut tree = StoryTree::new("ABCDE");
        tree.edit(1, 3, "xy").unwrap();
        tree.edit(0, 1, "Z").unwrap();
        assert_eq!(tree.flatten(), "ZxyDE");

        tree.undo().unwrap();
        assert_eq!(tree.flatten(), "AxyDE");

        tree.redo().unwrap();
        assert_eq!(tree.flatten(), "ZxyDE");
        check_invariants(&tree);
    }

    #[test]
    fn undo_then_redo_restores_position_and_content() {
        let mut tree = StoryTree::new("start");
        tree.push_fragment(FragmentOrigin::Generated, " middle".to_owned());
        tree.push_fragment(FragmentOrigin::Generated, " end".to_owned());

        let position = tree.position();
        let content = tree.flatten();

        tree.undo().unwrap();
        tree.redo().unwrap();
        assert_eq!(tree.position(), position);
        assert_eq!(tree.flatten(), content);
    }

    #[test]
    fn edit_spanning_fragments_targets_all_of_them() {
        let mut tree = StoryTree::new("Hello ");
        tree.push_fragment(FragmentOrigin::Generated, "world".to_owned());

        let id = tree.edit(4, 8, "XY").unwrap();
        assert_eq!(tree.flatten(), "HellXYrld");

        match &tree.fragment(id).unwrap().origin {
            FragmentOrigin::Edited { targets } => assert_eq!(targets, &[0, 1]),
            other => panic!("expected an edit fragment, got {other:?}"),
        }
        check_invariants(&tree);
    }

    #[test]
    fn edit_past_the_tail_keeps_an_empty_tail() {
        let mut tree = StoryTree::new("ABCDE");
        tree.edit(3, 100, "!").unwrap();
        assert_eq!(tree.flatten(), "ABC!");
    }

    #[test]
    fn edit_outside_content_fails_without_changes() {
        let mut tree = StoryTree::new("ABCDE");
        let before = tree.clone();

        assert_eq!(
            tree.edit(10, 12, "nope"),
            Err(TreeError::EditOutOfRange { start: 10, end: 12 })
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn edit_of_an_edit_collapses_to_one_emission() {
        let mut tree = StoryTree::new("one ");
        tree.push_fragment(FragmentOrigin::Generated, "two ".to_owned());
        tree.push_fragment(FragmentOrigin::Generated, "three".to_owned());

        // Replace across all three fragments, then edit the edit.
        tree.edit(2, 10, "-").unwrap();
        assert_eq!(tree.flatten(), "on-ree");

        tree.edit(0, 6, "done").unwrap();
        assert_eq!(tree.flatten(), "done");
        check_invariants(&tree);
    }

    #[test]
    fn undo_at_root_and_redo_at_tip_fail() {
        let mut tree = StoryTree::new("text");
        assert_eq!(tree.undo(), Err(TreeError::NothingToUndo));
        assert_eq!(tree.redo(), Err(TreeError::NothingToRedo));
    }

    #[test]
    fn new_edit_discards_the_redo_buffer() {
        let mut tree = StoryTree::new("AAAA");
        tree.push_fragment(FragmentOrigin::Generated, "BBBB".to_owned());
        tree.undo().unwrap();

        tree.edit(0, 2, "cc").unwrap();
        assert_eq!(tree.flatten(), "ccAA");
        assert_eq!(tree.redo(), Err(TreeError::NothingToRedo));

        // The abandoned branch is still addressable through the forest.
        assert_eq!(tree.fragment(0).unwrap().next, vec![1, 2]);
    }

    #[test]
    fn choose_revisits_distinct_branches() {
        let mut tree = StoryTree::new("root");
        tree.push_fragment(FragmentOrigin::Generated, " first".to_owned());
        tree.undo().unwrap();
        tree.push_fragment(FragmentOrigin::Generated, " second".to_owned());

        tree.undo().unwrap();
        let chosen = tree.choose(1).unwrap();
        assert_eq!(chosen, 2);
        assert_eq!(tree.flatten(), "root second");

        tree.undo().unwrap();
        let chosen = tree.choose(0).unwrap();
        assert_eq!(chosen, 1);
        assert_eq!(tree.flatten(), "root first");
        check_invariants(&tree);
    }

    #[test]
    fn choose_out_of_range_fails_without_changes() {
        let mut tree = StoryTree::new("root");
        tree.push_fragment(FragmentOrigin::Generated, " child".to_owned());
        tree.undo().unwrap();
        let before = tree.clone();

        assert_eq!(
            tree.choose(5),
            Err(TreeError::NoSuchBranch {
                index: 5,
                children: 1
            })
        );
        assert_eq!(tree, before);
    }

    #[test]
    fn context_is_the_exact_token_tail() {
        let content: String = "abcdefghij".repeat(10);
        let tree = StoryTree::new(content.clone());

        let context = tree.build_context(&CharTokenizer, Model::Holo6B, 10);
        let expected = CharTokenizer.encode(Model::Holo6B, &content);
        assert_eq!(context, expected[expected.len() - 10..]);
    }

    #[test]
    fn context_covers_short_documents_entirely() {
        let tree = StoryTree::new("short");
        let context = tree.build_context(&CharTokenizer, Model::Holo6B, 100);
        assert_eq!(context, CharTokenizer.encode(Model::Holo6B, "short"));
    }

    #[test]
    fn context_respects_multibyte_boundaries() {
        let tree = StoryTree::new("héllo wörld, ça va bien");
        let context = tree.build_context(&CharTokenizer, Model::Holo6B, 5);
        assert_eq!(CharTokenizer.decode(Model::Holo6B, &context), " bien");
    }

    #[tokio::test]
    async fn generate_appends_a_generated_fragment() {
        let mut tree = StoryTree::new("Once");
        let client = FixedCompletions(vec![" upon a time".to_owned()]);
        let params = GenerationParams::new(Model::Holo6B);

        let id = tree.generate(&client, &CharTokenizer, &params).await.unwrap();
        assert_eq!(tree.flatten(), "Once upon a time");
        assert_eq!(
            tree.fragment(id).unwrap().origin,
            FragmentOrigin::Generated
        );
        check_invariants(&tree);
    }

    #[tokio::test]
    async fn failed_generation_leaves_the_tree_untouched() {
        let mut tree = StoryTree::new("Once");
        let before = tree.clone();
        let params = GenerationParams::new(Model::Holo6B);

        let result = tree.generate(&BrokenCompletions, &CharTokenizer, &params).await;
        assert!(matches!(result, Err(ApiError::Api { status: 500, .. })));
        assert_eq!(tree, before);
    }

    #[tokio::test]
    async fn empty_completion_list_is_an_error() {
        let mut tree = StoryTree::new("Once");
        let before = tree.clone();
        let params = GenerationParams::new(Model::Holo6B);

        let client = FixedCompletions(Vec::new());
        let result = tree.generate(&client, &CharTokenizer, &params).await;
        assert!(matches!(result, Err(ApiError::MalformedResponse(_))));
        assert_eq!(tree, before);
    }
}
