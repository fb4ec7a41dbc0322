//! RouterOS command builders for leases and simple queues.
//!
//! Values are passed through [`quote`] so names and comments with spaces
//! survive tokenization.

use super::QueueSnapshot;
use crate::codec::quote;

pub const QUEUE_LIST: &str = "/queue simple print detail without-paging";

pub fn lease_lookup(address: &str) -> String {
    format!(
        "/ip dhcp-server lease print detail where address={}",
        quote(address)
    )
}

/// Set the lease rate-limit; an empty rate clears it.
pub fn lease_set_rate(address: &str, rate: &str) -> String {
    format!(
        "/ip dhcp-server lease set [find address={}] rate-limit={}",
        quote(address),
        quote(rate)
    )
}

pub fn queue_remove_by_name(name: &str) -> String {
    format!("/queue simple remove [find name={}]", quote(name))
}

/// Remove by the `/32`-qualified target RouterOS stores for host queues.
pub fn queue_remove_by_target(address: &str) -> String {
    format!(
        "/queue simple remove [find target={}]",
        quote(&format!("{}/32", address))
    )
}

/// Add a simple queue. The comment is only sent when non-empty.
pub fn queue_add(queue: &QueueSnapshot, default_kind: &str) -> String {
    let mut command = format!(
        "/queue simple add name={} target={} max-limit={} limit-at={} queue={}",
        quote(&queue.name),
        quote(queue.add_target()),
        quote(&queue.max_limit),
        quote(&queue.limit_at),
        quote(queue.queue.as_deref().unwrap_or(default_kind)),
    );
    if !queue.comment.is_empty() {
        command.push_str(" comment=");
        command.push_str(&quote(&queue.comment));
    }
    command
}
