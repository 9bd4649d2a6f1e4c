//! Progressive volume loading.
//!
//! A dataset source hands out one [`LoadStatus`] per subscriber. Loading
//! events flow through an unbounded channel; dropping the receiving side
//! unsubscribes, and the producer prunes closed subscribers on its next send.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::FutureExt;
use futures::StreamExt;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Clone, Debug, PartialEq)]
pub enum LoadEvent {
    /// Number of frames inserted so far.
    Progress(usize),
    Complete,
    Error(String),
}

pub type LoadEvents = UnboundedReceiver<LoadEvent>;

pub struct LoadStatus {
    pub is_loading: bool,
    pub total_frames: usize,
    pub events: Option<LoadEvents>,
}

impl LoadStatus {
    /// Status of a dataset whose pixel data is already resident.
    pub fn loaded() -> Self {
        Self {
            is_loading: false,
            total_frames: 0,
            events: None,
        }
    }
}

/// Producer side of a progressive load, shared by every subscriber.
#[derive(Clone)]
pub struct LoadFeed {
    total_frames: usize,
    subscribers: Rc<RefCell<Vec<UnboundedSender<LoadEvent>>>>,
    finished: Rc<Cell<bool>>,
}

impl LoadFeed {
    pub fn new(total_frames: usize) -> Self {
        Self {
            total_frames,
            subscribers: Rc::default(),
            finished: Rc::default(),
        }
    }

    pub fn subscribe(&self) -> LoadStatus {
        if self.finished.get() {
            return LoadStatus::loaded();
        }
        let (sender, receiver) = mpsc::unbounded();
        self.subscribers.borrow_mut().push(sender);
        LoadStatus {
            is_loading: true,
            total_frames: self.total_frames,
            events: Some(receiver),
        }
    }

    pub fn progress(&self, frames_inserted: usize) {
        self.broadcast(LoadEvent::Progress(frames_inserted));
    }

    pub fn complete(&self) {
        self.finished.set(true);
        self.broadcast(LoadEvent::Complete);
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.broadcast(LoadEvent::Error(message.into()));
    }

    /// Subscribers still listening, after pruning closed channels.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|sender| !sender.is_closed());
        subscribers.len()
    }

    fn broadcast(&self, event: LoadEvent) {
        self.subscribers
            .borrow_mut()
            .retain(|sender| sender.unbounded_send(event.clone()).is_ok());
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoadUpdate {
    Percent(u8),
    Loaded,
    Failed(String),
}

/// Subscriber side: turns raw load events into percent/loaded/failed updates.
pub struct LoadProgress {
    total_frames: usize,
    percent_complete: u8,
    loaded: bool,
    events: Option<LoadEvents>,
}

impl LoadProgress {
    pub fn new(status: LoadStatus) -> Self {
        Self {
            total_frames: status.total_frames,
            percent_complete: if status.is_loading { 0 } else { 100 },
            loaded: !status.is_loading,
            events: status.events.filter(|_| status.is_loading),
        }
    }

    pub fn percent_complete(&self) -> u8 {
        self.percent_complete
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_subscribed(&self) -> bool {
        self.events.is_some()
    }

    /// Drain every event that is already queued without waiting.
    pub fn pump(&mut self) -> Vec<LoadUpdate> {
        let mut updates = Vec::new();
        while let Some(events) = self.events.as_mut() {
            match events.next().now_or_never() {
                Some(Some(event)) => updates.extend(self.apply(event)),
                Some(None) => self.events = None,
                None => break,
            }
        }
        updates
    }

    /// Stop listening; the producer sees the channel as closed.
    pub fn unsubscribe(&mut self) {
        self.events = None;
    }

    fn apply(&mut self, event: LoadEvent) -> Option<LoadUpdate> {
        match event {
            LoadEvent::Progress(count) => {
                let percent = if self.total_frames == 0 {
                    100
                } else {
                    (count.min(self.total_frames) * 100 / self.total_frames) as u8
                };
                (percent != self.percent_complete).then(|| {
                    self.percent_complete = percent;
                    LoadUpdate::Percent(percent)
                })
            }
            LoadEvent::Complete => {
                self.loaded = true;
                self.events = None;
                Some(LoadUpdate::Loaded)
            }
            LoadEvent::Error(message) => Some(LoadUpdate::Failed(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resident_data_is_loaded_immediately() {
        let mut progress = LoadProgress::new(LoadStatus::loaded());
        assert!(progress.is_loaded());
        assert_eq!(progress.percent_complete(), 100);
        assert!(progress.pump().is_empty());
    }

    #[test]
    fn percent_updates_only_when_changed() {
        let feed = LoadFeed::new(300);
        let mut progress = LoadProgress::new(feed.subscribe());
        feed.progress(1);
        feed.progress(2);
        feed.progress(3);
        feed.progress(150);
        assert_eq!(
            progress.pump(),
            vec![LoadUpdate::Percent(1), LoadUpdate::Percent(50)]
        );
        feed.complete();
        assert_eq!(progress.pump(), vec![LoadUpdate::Loaded]);
        assert!(progress.is_loaded());
        assert!(!progress.is_subscribed());
    }

    #[test]
    fn errors_are_reported_without_ending_the_subscription() {
        let feed = LoadFeed::new(4);
        let mut progress = LoadProgress::new(feed.subscribe());
        feed.fail("frame 3 could not be decoded");
        assert_eq!(
            progress.pump(),
            vec![LoadUpdate::Failed("frame 3 could not be decoded".into())]
        );
        assert!(progress.is_subscribed());
    }

    #[test]
    fn unsubscribing_closes_the_channel() {
        let feed = LoadFeed::new(10);
        let mut first = LoadProgress::new(feed.subscribe());
        let _second = LoadProgress::new(feed.subscribe());
        assert_eq!(feed.subscriber_count(), 2);
        first.unsubscribe();
        assert_eq!(feed.subscriber_count(), 1);
        feed.progress(5);
        assert!(first.pump().is_empty());
    }

    #[test]
    fn subscribing_after_completion_reports_loaded() {
        let feed = LoadFeed::new(2);
        feed.complete();
        assert!(LoadProgress::new(feed.subscribe()).is_loaded());
    }
}
