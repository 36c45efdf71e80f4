use crate::{
    address,
    range_table::{BufferId, RangeEntry},
    slot_table::Tag,
};
use std::sync::Arc;

/// Query for the range entry of a buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    /// Accessed address, kept for the bounds evaluation.
    pub addr: address,
    pub buffer_id: BufferId,
    pub tag: Tag,
    /// Unique id of the originating trace.
    pub uuid: u64,
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rbt-entry-req: addr={:#x}, tag={}, buffer_id={} (#{})",
            self.addr, self.tag, self.buffer_id, self.uuid
        )
    }
}

/// Answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Response {
    pub tag: Tag,
    /// Shared reference to the entry owned by the range table.
    pub entry: Arc<RangeEntry>,
    pub uuid: u64,
    /// Address of the original request.
    pub req_addr: address,
    /// Buffer id that was requested.
    ///
    /// Differs from `entry.buffer_id` when the range table answered with
    /// the invalid sentinel entry.
    pub buffer_id: BufferId,
}

impl Response {
    /// Answer `req` with `entry`.
    #[must_use]
    pub fn new(req: &Request, entry: Arc<RangeEntry>) -> Self {
        Self {
            tag: req.tag,
            entry,
            uuid: req.uuid,
            req_addr: req.addr,
            buffer_id: req.buffer_id,
        }
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rbt-entry-rsp: tag={}, rbt_entry={} (#{})",
            self.tag, self.entry, self.uuid
        )
    }
}

/// Port pair of a range entry lookup server.
pub type Link = crate::port::Link<Request, Response>;
