use std::collections::VecDeque;

/// A queued item with its send and ready time.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Packet<T> {
    pub data: T,
    /// Cycle in which the item was sent.
    pub time: u64,
    /// First cycle in which the item is visible to the consumer.
    pub ready: u64,
}

/// Point-to-point channel that delivers items after a delay.
///
/// Items become visible in send order: an item sent with a short delay
/// waits behind an earlier item that is not yet visible.
/// There is no capacity limit, producers must bound their in-flight
/// requests themselves.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Port<T> {
    inner: VecDeque<Packet<T>>,
}

impl<T> Default for Port<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Display for Port<T>
where
    T: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Port({:>2}){:?}",
            self.inner.len(),
            self.inner
                .iter()
                .map(|packet| format!("{}@{}", packet.data, packet.ready))
                .collect::<Vec<_>>()
        )
    }
}

impl<T> Port<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: VecDeque::new(),
        }
    }

    /// Schedule `data` to become visible `delay` cycles after `now`.
    pub fn send(&mut self, data: T, delay: u64, now: u64) {
        assert!(delay > 0, "port: send with zero delay");
        self.inner.push_back(Packet {
            data,
            time: now,
            ready: now + delay,
        });
    }

    /// Returns true if no item is visible in cycle `now`.
    #[must_use]
    pub fn is_empty(&self, now: u64) -> bool {
        self.front(now).is_none()
    }

    /// The earliest visible item, if any.
    #[must_use]
    pub fn front(&self, now: u64) -> Option<&T> {
        match self.inner.front() {
            Some(packet) if packet.ready <= now => Some(&packet.data),
            _ => None,
        }
    }

    /// Remove the earliest visible item.
    ///
    /// Returns the item and the cycle it was sent in.
    pub fn pop(&mut self, now: u64) -> Option<(T, u64)> {
        if self.front(now).is_none() {
            return None;
        }
        let packet = self.inner.pop_front()?;
        Some((packet.data, packet.time))
    }

    /// Number of queued items, visible or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if any item is queued, visible or not.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.inner.is_empty()
    }

    /// Move every queued item into `other`, keeping its timing.
    pub fn forward_into(&mut self, other: &mut Self) {
        other.inner.extend(self.inner.drain(..));
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Request and response port pair of a component serving lookups.
///
/// The serving component reads `req` and sends into `rsp`, its client
/// does the opposite.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Link<Req, Rsp> {
    pub req: Port<Req>,
    pub rsp: Port<Rsp>,
}

impl<Req, Rsp> Default for Link<Req, Rsp> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Req, Rsp> Link<Req, Rsp> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            req: Port::new(),
            rsp: Port::new(),
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.req.has_pending() || self.rsp.has_pending()
    }
}
