//! Counted completion barrier: fan out `n` completion tokens, resolve one
//! future once all of them have reported, with values in token order.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BarrierError {
    #[error("completion {index} was dropped before reporting")]
    Abandoned { index: usize },
}

type Outcome<T> = Result<Vec<T>, BarrierError>;

/// Values a failed or dropped barrier can no longer deliver. The owner of the
/// bin decides how to dispose of them.
pub type Reclaimed<T> = Rc<RefCell<Vec<T>>>;

struct BarrierState<T> {
    slots: Vec<Option<T>>,
    remaining: usize,
    sender: Option<oneshot::Sender<Outcome<T>>>,
    closed: bool,
    reclaimed: Reclaimed<T>,
}

impl<T> BarrierState<T> {
    fn record(&mut self, index: usize, value: T) {
        if self.closed {
            self.reclaimed.borrow_mut().push(value);
            return;
        }
        if self.slots[index].replace(value).is_none() {
            self.remaining -= 1;
        }
        if self.remaining == 0 {
            let values: Option<Vec<T>> = self.slots.iter_mut().map(Option::take).collect();
            self.resolve(values.ok_or(BarrierError::Abandoned { index }));
        }
    }

    fn resolve(&mut self, outcome: Outcome<T>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(outcome);
        }
    }

    fn fail(&mut self, index: usize) {
        self.close();
        self.resolve(Err(BarrierError::Abandoned { index }));
    }

    /// Stop collecting: values already held and any reported later go to the
    /// reclaim bin.
    fn close(&mut self) {
        self.closed = true;
        let held = self.slots.iter_mut().filter_map(Option::take);
        self.reclaimed.borrow_mut().extend(held);
    }

    fn first_missing(&self) -> usize {
        self.slots.iter().position(Option::is_none).unwrap_or(0)
    }
}

/// Create a barrier expecting `count` completions. Values that arrive after
/// the barrier failed or its waiter was dropped end up in `reclaimed`.
pub fn barrier<T>(count: usize, reclaimed: Reclaimed<T>) -> (Vec<Completion<T>>, BarrierWait<T>) {
    let (sender, receiver) = oneshot::channel();
    let state = Rc::new(RefCell::new(BarrierState {
        slots: (0..count).map(|_| None).collect(),
        remaining: count,
        sender: Some(sender),
        closed: false,
        reclaimed,
    }));
    if count == 0 {
        state.borrow_mut().resolve(Ok(Vec::new()));
    }

    let completions = (0..count)
        .map(|index| Completion {
            index,
            state: Some(Rc::clone(&state)),
        })
        .collect();

    (completions, BarrierWait { state, receiver })
}

/// One expected completion. Dropping it without calling
/// [`Completion::complete`] fails the whole barrier.
pub struct Completion<T> {
    index: usize,
    state: Option<Rc<RefCell<BarrierState<T>>>>,
}

impl<T> Completion<T> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn complete(mut self, value: T) {
        if let Some(state) = self.state.take() {
            state.borrow_mut().record(self.index, value);
        }
    }
}

impl<T> Drop for Completion<T> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            state.borrow_mut().fail(self.index);
        }
    }
}

/// Resolves once every completion has reported.
pub struct BarrierWait<T> {
    state: Rc<RefCell<BarrierState<T>>>,
    receiver: oneshot::Receiver<Outcome<T>>,
}

impl<T> BarrierWait<T> {
    /// Completions still outstanding.
    pub fn remaining(&self) -> usize {
        self.state.borrow().remaining
    }
}

impl<T> Future for BarrierWait<T> {
    type Output = Outcome<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(BarrierError::Abandoned {
                index: this.state.borrow().first_missing(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> Drop for BarrierWait<T> {
    fn drop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.close();
        // Resolved but never polled.
        if let Ok(Some(Ok(values))) = self.receiver.try_recv() {
            state.reclaimed.borrow_mut().extend(values);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn resolves_in_index_order_after_last_completion() {
        let (completions, mut wait) = barrier::<&str>(3, Reclaimed::default());
        let mut completions: Vec<_> = completions.into_iter().map(Some).collect();

        completions[2].take().unwrap().complete("coronal");
        completions[0].take().unwrap().complete("axial");
        assert_eq!(wait.remaining(), 1);
        assert!((&mut wait).now_or_never().is_none());

        completions[1].take().unwrap().complete("sagittal");
        assert_eq!(wait.remaining(), 0);
        assert_eq!(
            wait.now_or_never(),
            Some(Ok(vec!["axial", "sagittal", "coronal"]))
        );
    }

    #[test]
    fn empty_barrier_is_ready() {
        let (completions, wait) = barrier::<u8>(0, Reclaimed::default());
        assert!(completions.is_empty());
        assert_eq!(wait.now_or_never(), Some(Ok(vec![])));
    }

    #[test]
    fn dropped_completion_fails_the_barrier() {
        let (mut completions, wait) = barrier::<u8>(2, Reclaimed::default());
        let second = completions.pop().unwrap();
        let first = completions.pop().unwrap();
        first.complete(1);
        drop(second);
        assert_eq!(
            wait.now_or_never(),
            Some(Err(BarrierError::Abandoned { index: 1 }))
        );
    }

    #[test]
    fn failed_barrier_reclaims_completed_and_late_values() {
        let reclaimed = Reclaimed::default();
        let (completions, wait) = barrier::<u8>(3, Rc::clone(&reclaimed));
        let mut completions = completions.into_iter();
        let (first, second, third) = (
            completions.next().unwrap(),
            completions.next().unwrap(),
            completions.next().unwrap(),
        );

        second.complete(2);
        drop(first);
        assert_eq!(*reclaimed.borrow(), vec![2]);
        third.complete(3);
        assert_eq!(*reclaimed.borrow(), vec![2, 3]);
        assert_eq!(
            wait.now_or_never(),
            Some(Err(BarrierError::Abandoned { index: 0 }))
        );
    }

    #[test]
    fn dropped_wait_reclaims_everything() {
        let reclaimed = Reclaimed::default();
        let (completions, wait) = barrier::<u8>(2, Rc::clone(&reclaimed));
        let mut completions = completions.into_iter();
        let (first, second) = (completions.next().unwrap(), completions.next().unwrap());

        first.complete(1);
        drop(wait);
        second.complete(2);
        assert_eq!(*reclaimed.borrow(), vec![1, 2]);
    }

    #[test]
    fn resolved_but_unpolled_values_are_reclaimed() {
        let reclaimed = Reclaimed::default();
        let (completions, wait) = barrier::<u8>(1, Rc::clone(&reclaimed));
        completions.into_iter().for_each(|completion| completion.complete(7));
        drop(wait);
        assert_eq!(*reclaimed.borrow(), vec![7]);
    }
}
