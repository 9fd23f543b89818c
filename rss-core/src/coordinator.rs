use tokio::sync::watch;

/// Latest-wins coordination for superseding requests.
///
/// Every [`RequestCoordinator::begin`] bumps a generation counter, which
/// invalidates all tokens handed out before it. Results are committed only
/// while their token is still current.
#[derive(Debug)]
pub struct RequestCoordinator {
    generation: watch::Sender<u64>,
}

impl Default for RequestCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCoordinator {
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    pub fn begin(&self) -> RequestToken {
        let mut issued = 0;
        self.generation.send_modify(|current| {
            *current += 1;
            issued = *current;
        });
        RequestToken {
            generation: issued,
            rx: self.generation.subscribe(),
        }
    }

    pub fn cancel_all(&self) {
        self.generation.send_modify(|current| *current += 1);
    }
}

#[derive(Debug, Clone)]
pub struct RequestToken {
    generation: u64,
    rx: watch::Receiver<u64>,
}

impl RequestToken {
    pub fn is_current(&self) -> bool {
        *self.rx.borrow() == self.generation
    }

    /// Resolves once a newer request has started or the coordinator is gone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() != self.generation {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}
