//! Settle-once result cells shared between every waiter of one request.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, StoreError};

type Callback<T> = Box<dyn FnOnce(&Result<T>)>;

struct Inner<T> {
    result: Option<Result<T>>,
    callbacks: Vec<Callback<T>>,
}

/// The eventual result of a store request.
///
/// Cloning shares the cell: coalesced callers hold clones of one `Deferred`
/// and observe the same outcome. Results become available when the store
/// flushes its task queue.
pub struct Deferred<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Deferred {
            inner: Rc::new(RefCell::new(Inner {
                result: None,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn resolved(value: T) -> Self {
        let deferred = Self::new();
        deferred.inner.borrow_mut().result = Some(Ok(value));
        deferred
    }

    pub fn rejected(error: StoreError) -> Self {
        let deferred = Self::new();
        deferred.inner.borrow_mut().result = Some(Err(error));
        deferred
    }

    pub fn is_settled(&self) -> bool {
        self.inner.borrow().result.is_some()
    }

    pub fn ptr_eq(a: &Deferred<T>, b: &Deferred<T>) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: StoreError) -> bool {
        self.settle(Err(error))
    }

    /// Store the outcome and run callbacks. Later settles are ignored.
    pub fn settle(&self, result: Result<T>) -> bool {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            if inner.result.is_some() {
                return false;
            }
            inner.result = Some(result);
            std::mem::take(&mut inner.callbacks)
        };

        let inner = self.inner.borrow();
        if let Some(result) = inner.result.as_ref() {
            for callback in callbacks {
                callback(result);
            }
        }
        true
    }

    /// Run `callback` once settled (immediately if already settled).
    pub fn on_settle(&self, callback: impl FnOnce(&Result<T>) + 'static) {
        if self.is_settled() {
            let inner = self.inner.borrow();
            if let Some(result) = inner.result.as_ref() {
                callback(result);
            }
            return;
        }
        self.inner.borrow_mut().callbacks.push(Box::new(callback));
    }
}

impl<T: Clone> Deferred<T> {
    /// The outcome, if settled.
    pub fn result(&self) -> Option<Result<T>> {
        self.inner.borrow().result.clone()
    }

    pub fn value(&self) -> Option<T> {
        match self.inner.borrow().result.as_ref() {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<StoreError> {
        match self.inner.borrow().result.as_ref() {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }
}

impl<T: Clone + 'static> Deferred<T> {
    /// A deferred settling with `f` applied to this one's value.
    pub fn map<U: 'static>(&self, f: impl FnOnce(T) -> U + 'static) -> Deferred<U> {
        let mapped = Deferred::new();
        let target = mapped.clone();
        self.on_settle(move |result| {
            target.settle(result.clone().map(f));
        });
        mapped
    }

    /// Settles with every value in order, or with the first error.
    pub fn join_all(deferreds: Vec<Deferred<T>>) -> Deferred<Vec<T>> {
        let joined = Deferred::new();
        if deferreds.is_empty() {
            joined.resolve(Vec::new());
            return joined;
        }

        let slots: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; deferreds.len()]));
        for (index, deferred) in deferreds.iter().enumerate() {
            let slots = Rc::clone(&slots);
            let joined = joined.clone();
            deferred.on_settle(move |result| match result {
                Ok(value) => {
                    let complete = {
                        let mut slots = slots.borrow_mut();
                        slots[index] = Some(value.clone());
                        slots.iter().all(Option::is_some)
                    };
                    if complete {
                        let values = slots.borrow_mut().drain(..).flatten().collect();
                        joined.resolve(values);
                    }
                }
                Err(error) => {
                    joined.reject(error.clone());
                }
            });
        }
        joined
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let state = match &inner.result {
            None => "pending",
            Some(Ok(_)) => "resolved",
            Some(Err(_)) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}
