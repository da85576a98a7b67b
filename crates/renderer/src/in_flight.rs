use crossbeam_channel::{Receiver, Sender, TryRecvError};

/// Limits the GPU to one frame in flight.
///
/// A single token circulates through a bounded channel. Encoding a frame takes
/// it; the submission's completion callback (or dropping an unsubmitted frame)
/// puts it back.
pub struct InFlightGate {
    tokens: Receiver<()>,
    returns: Sender<()>,
}

impl Default for InFlightGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InFlightGate {
    pub fn new() -> Self {
        let (returns, tokens) = crossbeam_channel::bounded(1);
        returns
            .send(())
            .expect("fresh in-flight channel has room for its token");
        Self { tokens, returns }
    }

    pub fn try_acquire(&self) -> Option<InFlightToken> {
        match self.tokens.try_recv() {
            Ok(()) => Some(InFlightToken {
                returns: self.returns.clone(),
            }),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                unreachable!("in-flight gate owns a sender")
            }
        }
    }

    /// Calls `wait` until the token is back. `wait` must make progress on
    /// outstanding submissions, e.g. by polling the device.
    pub fn acquire_with(&self, mut wait: impl FnMut()) -> InFlightToken {
        loop {
            if let Some(token) = self.try_acquire() {
                return token;
            }
            wait();
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.tokens.is_empty()
    }
}

/// Returned to its gate on drop.
pub struct InFlightToken {
    returns: Sender<()>,
}

impl Drop for InFlightToken {
    fn drop(&mut self) {
        // Capacity is one and only this token can fill it.
        let _ = self.returns.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_token_is_out_at_a_time() {
        let gate = InFlightGate::new();
        let token = gate.try_acquire().expect("first acquire");
        assert!(gate.try_acquire().is_none());
        assert!(!gate.is_idle());
        drop(token);
        assert!(gate.is_idle());
        assert!(gate.try_acquire().is_some());
    }

    #[test]
    fn acquire_waits_for_release_from_another_thread() {
        let gate = InFlightGate::new();
        let token = gate.try_acquire().expect("first acquire");
        let (release_sender, release_receiver) = crossbeam_channel::bounded::<InFlightToken>(1);
        let releaser = std::thread::spawn(move || {
            let token = release_receiver.recv().expect("receive token");
            drop(token);
        });

        let mut handed_over = Some(token);
        let mut waits = 0;
        let _token = gate.acquire_with(|| {
            waits += 1;
            if let Some(token) = handed_over.take() {
                release_sender.send(token).expect("hand token to releaser");
            }
            std::thread::yield_now();
        });
        releaser.join().expect("join releaser");
        assert!(waits >= 1);
    }
}
