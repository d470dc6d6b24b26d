//! Whole-document last-writer-wins merge
//!
//! Tasks are never reconciled individually. Two clients that save within the
//! same polling interval will lose the older of the two writes; this is the
//! accepted cost of running against anonymous providers with no concurrency
//! tokens.

use crate::models::Document;

/// Which side a merge picked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// Decide which document wins
///
/// - no remote: local
/// - local never saved: remote
/// - otherwise remote only when its stamp is strictly later; equal stamps and
///   unparseable remote stamps keep local
pub fn pick(local: &Document, remote: Option<&Document>) -> Winner {
    let Some(remote) = remote else {
        return Winner::Local;
    };
    let Some(local_stamp) = local.stamp() else {
        return Winner::Remote;
    };

    match (remote.saved_at(), crate::models::parse_stamp(local_stamp)) {
        (Some(remote_at), Some(local_at)) if remote_at > local_at => Winner::Remote,
        // a readable remote stamp beats an unreadable local one
        (Some(_), None) => Winner::Remote,
        _ => Winner::Local,
    }
}

/// Merge a local snapshot with the remote one
pub fn merge(local: Document, remote: Option<Document>) -> Document {
    match pick(&local, remote.as_ref()) {
        Winner::Local => local,
        Winner::Remote => remote.unwrap_or(local),
    }
}

/// Whether a shell should replace its local document with `remote`
///
/// Stricter than [`merge`]: a remote without a readable stamp is never
/// adopted.
pub fn should_accept_remote(local: &Document, remote: &Document) -> bool {
    let Some(remote_at) = remote.saved_at() else {
        return false;
    };
    match local.saved_at() {
        None => true,
        Some(local_at) => remote_at > local_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Horizon, Task};

    fn doc(stamp: Option<&str>, task_ids: &[&str]) -> Document {
        let mut d = Document::unsaved();
        d.last_saved = stamp.map(str::to_string);
        d.tasks = task_ids
            .iter()
            .map(|id| Task::with_id(*id, format!("task {id}"), Horizon::Days))
            .collect();
        d
    }

    const T1: &str = "2024-05-01T10:00:00.000Z";
    const T2: &str = "2024-05-01T10:00:05.000Z";

    #[test]
    fn test_later_stamp_wins_either_way_round() {
        let a = doc(Some(T1), &["a"]);
        let b = doc(Some(T2), &["b"]);

        assert_eq!(merge(a.clone(), Some(b.clone())), b);
        assert_eq!(merge(b.clone(), Some(a.clone())), b);
    }

    #[test]
    fn test_null_remote_keeps_local() {
        let local = doc(Some(T1), &["a"]);
        assert_eq!(merge(local.clone(), None), local);

        let unsaved = doc(None, &[]);
        assert_eq!(merge(unsaved.clone(), None), unsaved);
    }

    #[test]
    fn test_unsaved_local_takes_remote() {
        let remote = doc(Some(T1), &["1"]);
        assert_eq!(merge(doc(None, &[]), Some(remote.clone())), remote);
        assert_eq!(merge(doc(Some(""), &[]), Some(remote.clone())), remote);

        // even a remote with no stamp at all
        let bare = doc(None, &["r"]);
        assert_eq!(merge(doc(None, &[]), Some(bare.clone())), bare);
    }

    #[test]
    fn test_equal_stamps_keep_local() {
        let local = doc(Some(T1), &["local"]);
        let remote = doc(Some(T1), &["remote"]);
        assert_eq!(pick(&local, Some(&remote)), Winner::Local);
        assert_eq!(merge(local.clone(), Some(remote)), local);
    }

    #[test]
    fn test_unparseable_remote_stamp_is_not_newer() {
        let local = doc(Some(T1), &["local"]);
        for stamp in [Some("garbage"), None, Some("")] {
            let remote = doc(stamp, &["remote"]);
            assert_eq!(merge(local.clone(), Some(remote)), local);
        }
    }

    #[test]
    fn test_stamps_compare_as_instants() {
        // same instant written with an offset is not newer
        let local = doc(Some("2024-05-01T10:00:00.000Z"), &["l"]);
        let remote = doc(Some("2024-05-01T12:00:00.000+02:00"), &["r"]);
        assert_eq!(pick(&local, Some(&remote)), Winner::Local);

        let later = doc(Some("2024-05-01T12:00:00.001+02:00"), &["r"]);
        assert_eq!(pick(&local, Some(&later)), Winner::Remote);
    }

    #[test]
    fn test_should_accept_remote() {
        let local = doc(Some(T1), &[]);
        assert!(should_accept_remote(&local, &doc(Some(T2), &[])));
        assert!(!should_accept_remote(&local, &doc(Some(T1), &[])));
        assert!(!should_accept_remote(&local, &doc(None, &[])));
        assert!(should_accept_remote(&doc(None, &[]), &doc(Some(T1), &[])));
        assert!(!should_accept_remote(&doc(Some(T2), &[]), &doc(Some(T1), &[])));
    }
}
