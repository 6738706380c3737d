pub mod http;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::app::{Result, SiftError};
use crate::config::{EXEMPLAR_LIMIT, MAX_ROUNDS};
use crate::domain::{Category, Item};
use crate::store::{Exemplar, Store};

pub use http::HttpBackend;

/// The oracle transport seam: one prompt in, one text completion out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Items committed per side over a full classification run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ClassifyOutcome {
    pub liked: usize,
    pub disliked: usize,
}

/// Batch classifier over an external categorization oracle.
///
/// Each round submits the still-unassigned items together with the
/// store's retained exemplars and expects back a two-way partition of
/// the submitted ids. Ids the oracle resolves are committed to the
/// store immediately, so later rounds see them as exemplars; ids it
/// misses are resubmitted alone. After `max_rounds` rounds anything
/// still unresolved aborts the run.
pub struct Classifier {
    backend: Arc<dyn CompletionBackend>,
    max_rounds: usize,
}

#[derive(Serialize)]
struct Submission<'a> {
    id: &'a str,
    title: &'a str,
    url: &'a str,
    description: &'a str,
    tags: &'a [String],
}

impl Classifier {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self::with_rounds(backend, MAX_ROUNDS)
    }

    pub fn with_rounds(backend: Arc<dyn CompletionBackend>, max_rounds: usize) -> Self {
        Self {
            backend,
            max_rounds,
        }
    }

    pub async fn classify_batch(
        &self,
        store: &dyn Store,
        mut outstanding: Vec<Item>,
    ) -> Result<ClassifyOutcome> {
        let mut outcome = ClassifyOutcome::default();
        if outstanding.is_empty() {
            return Ok(outcome);
        }

        for round in 1..=self.max_rounds {
            // Re-read exemplars each round: batches committed by earlier
            // rounds feed back into later ones within the same run.
            let liked = store.exemplars(Category::Liked, EXEMPLAR_LIMIT)?;
            let disliked = store.exemplars(Category::Disliked, EXEMPLAR_LIMIT)?;

            let prompt = build_prompt(&outstanding, &liked, &disliked)?;
            let raw = self.backend.complete(&prompt).await?;

            let (liked_ids, disliked_ids) = match parse_partition(&raw) {
                Ok(partition) => partition,
                Err(e) => {
                    tracing::warn!(round, error = %e, "unparseable oracle response, retrying");
                    continue;
                }
            };

            let assignment = check_assignment(&outstanding, liked_ids, disliked_ids);

            let now = Utc::now().timestamp();
            let (resolved, rest): (Vec<Item>, Vec<Item>) = outstanding
                .into_iter()
                .partition(|item| assignment.contains_key(&item.id));
            outstanding = rest;

            let mut liked_batch = Vec::new();
            let mut disliked_batch = Vec::new();
            for mut item in resolved {
                let category = assignment[&item.id];
                item.category = Some(category);
                item.sorted_at = Some(now);
                match category {
                    Category::Liked => liked_batch.push(item),
                    Category::Disliked => disliked_batch.push(item),
                }
            }

            // Committed side by side so a later failure never undoes an
            // assignment the oracle already made.
            if !liked_batch.is_empty() {
                outcome.liked += store.insert_batch(&liked_batch)?;
                store.evict_overflow(Category::Liked)?;
            }
            if !disliked_batch.is_empty() {
                outcome.disliked += store.insert_batch(&disliked_batch)?;
                store.evict_overflow(Category::Disliked)?;
            }

            if outstanding.is_empty() {
                return Ok(outcome);
            }
            tracing::debug!(
                round,
                unresolved = outstanding.len(),
                "oracle left ids unassigned, resubmitting subset"
            );
        }

        Err(SiftError::OracleIncomplete {
            unresolved: outstanding.len(),
        })
    }
}

fn build_prompt(
    outstanding: &[Item],
    liked: &[Exemplar],
    disliked: &[Exemplar],
) -> Result<String> {
    let submitted: Vec<Submission> = outstanding
        .iter()
        .map(|item| Submission {
            id: &item.id,
            title: &item.title,
            url: &item.url,
            description: &item.description,
            tags: &item.tags,
        })
        .collect();

    Ok(format!(
        "You sort news items for a single reader based on their reading history.\n\
         \n\
         Items the reader previously liked:\n{}\n\
         \n\
         Items the reader previously disliked:\n{}\n\
         \n\
         Classify every item below as liked or disliked:\n{}\n\
         \n\
         Respond with exactly two JSON arrays of ids and nothing else. \
         The first array holds the liked ids, the second the disliked ids. \
         Every submitted id must appear in exactly one of the two arrays.",
        serde_json::to_string(liked)?,
        serde_json::to_string(disliked)?,
        serde_json::to_string(&submitted)?,
    ))
}

/// Strip an optional fenced-code wrapper from the oracle's reply.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

/// Parse the two-array reply shape: either one wrapping array of two
/// arrays, or two consecutive top-level arrays.
fn parse_partition(raw: &str) -> Result<(Vec<String>, Vec<String>)> {
    let body = strip_fences(raw);

    if let Ok(partition) = serde_json::from_str::<(Vec<String>, Vec<String>)>(body) {
        return Ok(partition);
    }

    let mut stream = serde_json::Deserializer::from_str(body).into_iter::<Vec<String>>();
    let first = stream
        .next()
        .transpose()
        .map_err(|e| SiftError::OracleContract(format!("first array: {}", e)))?
        .ok_or_else(|| SiftError::OracleContract("reply held no JSON arrays".into()))?;
    let second = stream
        .next()
        .transpose()
        .map_err(|e| SiftError::OracleContract(format!("second array: {}", e)))?
        .ok_or_else(|| SiftError::OracleContract("reply held only one JSON array".into()))?;
    Ok((first, second))
}

/// Validate the oracle's partition against the submitted set. Unknown
/// ids and ids claimed on both sides are logged and left unassigned;
/// everything else maps to its category.
fn check_assignment(
    outstanding: &[Item],
    liked_ids: Vec<String>,
    disliked_ids: Vec<String>,
) -> HashMap<String, Category> {
    let submitted: HashSet<&str> = outstanding.iter().map(|item| item.id.as_str()).collect();

    let mut assignment = HashMap::new();
    let mut conflicts = Vec::new();
    let sides = [
        (Category::Liked, liked_ids),
        (Category::Disliked, disliked_ids),
    ];
    for (category, ids) in sides {
        for id in ids {
            if !submitted.contains(id.as_str()) {
                tracing::warn!(id = %id, "oracle returned an id that was never submitted");
                continue;
            }
            if assignment.insert(id.clone(), category).is_some() {
                conflicts.push(id);
            }
        }
    }
    for id in conflicts {
        tracing::warn!(id = %id, "oracle placed an id in both arrays, leaving unresolved");
        assignment.remove(&id);
    }
    assignment
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::domain::Source;
    use crate::store::SqliteStore;

    fn pending_item(native_id: &str) -> Item {
        let mut item = Item::new(Source::HackerNews, native_id);
        item.title = format!("story {}", native_id);
        item.created_at = 1_700_000_000;
        item
    }

    /// Replays a fixed sequence of oracle replies and records the ids
    /// submitted in each round's prompt.
    struct ScriptedBackend {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().rev().map(String::from).collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompt(&self, round: usize) -> String {
            self.prompts.lock().unwrap()[round].clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| SiftError::Other("script exhausted".into()))
        }
    }

    #[test]
    fn test_parse_partition_wrapped() {
        let (liked, disliked) = parse_partition(r#"[["hn-1"], ["hn-2", "hn-3"]]"#).unwrap();
        assert_eq!(liked, vec!["hn-1"]);
        assert_eq!(disliked, vec!["hn-2", "hn-3"]);
    }

    #[test]
    fn test_parse_partition_consecutive_arrays() {
        let (liked, disliked) = parse_partition("[\"hn-1\"]\n[\"hn-2\"]").unwrap();
        assert_eq!(liked, vec!["hn-1"]);
        assert_eq!(disliked, vec!["hn-2"]);
    }

    #[test]
    fn test_parse_partition_strips_fences() {
        let raw = "```json\n[[\"hn-1\"], []]\n```";
        let (liked, disliked) = parse_partition(raw).unwrap();
        assert_eq!(liked, vec!["hn-1"]);
        assert!(disliked.is_empty());
    }

    #[test]
    fn test_parse_partition_rejects_single_array() {
        assert!(parse_partition(r#"["hn-1", "hn-2"]"#).is_err());
    }

    #[test]
    fn test_parse_partition_rejects_prose() {
        assert!(parse_partition("Sure! The liked items are hn-1 and hn-2.").is_err());
    }

    #[test]
    fn test_check_assignment_drops_unknown_and_conflicting_ids() {
        let items = vec![pending_item("1"), pending_item("2")];
        let assignment = check_assignment(
            &items,
            vec!["hn-1".into(), "hn-2".into(), "hn-999".into()],
            vec!["hn-2".into()],
        );
        assert_eq!(assignment.get("hn-1"), Some(&Category::Liked));
        // Claimed on both sides: stays unresolved.
        assert!(!assignment.contains_key("hn-2"));
        assert!(!assignment.contains_key("hn-999"));
    }

    #[tokio::test]
    async fn test_single_round_partition_commits_both_sides() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![r#"[["hn-1"], ["hn-2"]]"#]));
        let classifier = Classifier::new(backend);

        let outcome = classifier
            .classify_batch(&store, vec![pending_item("1"), pending_item("2")])
            .await
            .unwrap();

        assert_eq!(outcome, ClassifyOutcome { liked: 1, disliked: 1 });
        let item = store.get_item("hn-1").unwrap().unwrap();
        assert_eq!(item.category, Some(Category::Liked));
        assert!(item.sorted_at.is_some());
    }

    #[tokio::test]
    async fn test_partial_round_resubmits_only_unresolved() {
        let store = SqliteStore::in_memory().unwrap();
        // Round 1 resolves hn-1 only; round 2 must carry just hn-2 and hn-3.
        let backend = Arc::new(ScriptedBackend::new(vec![
            r#"[["hn-1"], []]"#,
            r#"[["hn-3"], ["hn-2"]]"#,
        ]));
        let classifier = Classifier::new(backend.clone());

        let items = vec![pending_item("1"), pending_item("2"), pending_item("3")];
        let outcome = classifier.classify_batch(&store, items).await.unwrap();

        assert_eq!(outcome, ClassifyOutcome { liked: 2, disliked: 1 });
        let second_prompt = backend.prompt(1);
        assert!(!second_prompt.contains(r#""id":"hn-1""#));
        assert!(second_prompt.contains(r#""id":"hn-2""#));
        assert!(second_prompt.contains(r#""id":"hn-3""#));
    }

    #[tokio::test]
    async fn test_committed_batch_feeds_next_rounds_exemplars() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![
            r#"[["hn-1"], []]"#,
            r#"[[], ["hn-2"]]"#,
        ]));
        let classifier = Classifier::new(backend.clone());

        classifier
            .classify_batch(&store, vec![pending_item("1"), pending_item("2")])
            .await
            .unwrap();

        // Round 2's prompt carries story 1 as a liked exemplar. Exemplar
        // objects have no id field, so they start at the title.
        assert!(backend.prompt(1).contains(r#"{"title":"story 1""#));
        assert!(!backend.prompt(0).contains(r#"{"title":"story 1""#));
    }

    #[tokio::test]
    async fn test_unresolved_after_retry_ceiling_is_fatal() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![
            r#"[[], []]"#,
            r#"[[], []]"#,
            r#"[[], []]"#,
        ]));
        let classifier = Classifier::new(backend);

        let err = classifier
            .classify_batch(&store, vec![pending_item("1")])
            .await
            .unwrap_err();
        assert!(matches!(err, SiftError::OracleIncomplete { unresolved: 1 }));
    }

    #[tokio::test]
    async fn test_garbage_reply_consumes_a_round_then_recovers() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![
            "I could not decide.",
            r#"[["hn-1"], []]"#,
        ]));
        let classifier = Classifier::new(backend);

        let outcome = classifier
            .classify_batch(&store, vec![pending_item("1")])
            .await
            .unwrap();
        assert_eq!(outcome, ClassifyOutcome { liked: 1, disliked: 0 });
    }

    #[tokio::test]
    async fn test_empty_batch_never_calls_oracle() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = Arc::new(ScriptedBackend::new(vec![]));
        let classifier = Classifier::new(backend);

        let outcome = classifier.classify_batch(&store, Vec::new()).await.unwrap();
        assert_eq!(outcome, ClassifyOutcome::default());
    }
}
