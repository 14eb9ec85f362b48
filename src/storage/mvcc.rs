use crate::types::{CommitId, MAX_COMMIT_ID, TransactionId};

/// Per-row visibility metadata for one chunk, kept as parallel arrays so the
/// validate operator touches three cache lines per row at most.
#[derive(Debug, Clone)]
pub struct MvccArrays {
    pub begin_cids: Vec<CommitId>,
    pub end_cids: Vec<CommitId>,
    pub tids: Vec<TransactionId>,
}

impl MvccArrays {
    /// Arrays for a freshly committed chunk: every row inserted at
    /// `begin_cid`, never deleted, not owned by any live transaction.
    pub fn new_committed(len: usize, begin_cid: CommitId) -> Self {
        MvccArrays {
            begin_cids: vec![begin_cid; len],
            end_cids: vec![MAX_COMMIT_ID; len],
            tids: vec![0; len],
        }
    }

    pub fn len(&self) -> usize {
        self.begin_cids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.begin_cids.is_empty()
    }

    pub fn set_row(
        &mut self,
        index: usize,
        begin_cid: CommitId,
        end_cid: CommitId,
        tid: TransactionId,
    ) {
        self.begin_cids[index] = begin_cid;
        self.end_cids[index] = end_cid;
        self.tids[index] = tid;
    }
}

/// The transaction view a query runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub transaction_id: TransactionId,
    pub snapshot_commit_id: CommitId,
}

impl Snapshot {
    pub fn new(transaction_id: TransactionId, snapshot_commit_id: CommitId) -> Self {
        Snapshot {
            transaction_id,
            snapshot_commit_id,
        }
    }
}

/// Row visibility under a snapshot.
///
/// A row owned by the running transaction is visible only while it is that
/// transaction's own uncommitted insert; an own delete hides it immediately.
/// Rows owned by other transactions are visible when committed within the
/// snapshot horizon and not deleted inside it.
pub fn is_row_visible(
    snapshot: Snapshot,
    begin_cid: CommitId,
    end_cid: CommitId,
    tid: TransactionId,
) -> bool {
    if tid == snapshot.transaction_id {
        begin_cid > snapshot.snapshot_commit_id && end_cid == MAX_COMMIT_ID
    } else {
        begin_cid <= snapshot.snapshot_commit_id
            && (end_cid == MAX_COMMIT_ID || end_cid > snapshot.snapshot_commit_id)
    }
}
