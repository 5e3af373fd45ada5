//! A reentrant shared/exclusive gate with a barring mode and scoped
//! release.
//!
//! The gate coordinates threads around a protected resource in three
//! modes:
//!
//! * **enter/exit** -- shared holds. Any number of threads may be inside at
//!   once, and a thread already inside may always deepen its own hold, even
//!   while another thread is trying to shut the gate.
//! * **close/open** -- the exclusive hold. One thread system-wide, granted
//!   only once every shared hold has drained. The exclusive owner may keep
//!   taking shared holds of its own (downgrade); the reverse escalation --
//!   closing while holding a shared hold -- is not supported and simply
//!   runs out its budget.
//! * **bar** -- a softer exclusivity. A bar blocks *other* threads from
//!   entering or closing but evicts nobody already inside, and the owner
//!   keeps full freedom to enter, exit, and close. Threads blocked on a bar
//!   watch the owner's liveness and forcibly lift a bar whose owner
//!   terminated without releasing it.
//!
//! Every acquisition comes in three flavors: blocking (`enter`, `close`,
//! `bar_entry`), immediate (`try_*`), and bounded (`try_*_for`). A bounded
//! budget is carried across every internal retry -- bar waits, install
//! races, drain back-outs -- so elapsed time is never granted twice.
//! Expiry is a plain `None`, not an error.
//!
//! Releases are scoped: each grant hands back a sentry whose drop performs
//! exactly the matching release, on every exit path. Sentries are not
//! `Send`; a hold belongs to the thread that took it.

use core::fmt;
use core::marker::PhantomData;
use core::ops::Deref;
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex, MutexGuard};

/// Longest stretch a thread blocked on a bar sleeps between checks of the
/// owner's liveness.
const BAR_POLL: Duration = Duration::from_millis(250);

thread_local! {
    /// Per-thread liveness token. A bar holds a weak reference to its
    /// owner's token; thread-local teardown drops the strong side, which is
    /// how waiters notice the owner terminated.
    static LIVENESS: Arc<()> = Arc::new(());
}

/// The exclusive engagement, if any.
struct Exclusive {
    owner: ThreadId,
    /// `0` while the owner is still draining shared holds (closing);
    /// `>= 1` once the gate is closed, counting reentrant closes.
    holds: u32,
}

/// The bar engagement, if any.
struct Bar {
    owner: ThreadId,
    liveness: Weak<()>,
    /// Reentrant bar count; the bar lifts when it returns to zero.
    count: u32,
}

impl Bar {
    fn owner_terminated(&self) -> bool {
        self.liveness.strong_count() == 0
    }
}

struct GateState {
    /// Outstanding shared holds per thread.
    enters: HashMap<ThreadId, u64>,
    /// Total outstanding shared holds.
    active: u64,
    exclusive: Option<Exclusive>,
    bar: Option<Bar>,
}

impl GateState {
    fn shared_holds(&self, thread: ThreadId) -> u64 {
        self.enters.get(&thread).copied().unwrap_or(0)
    }

    fn grant_enter(&mut self, thread: ThreadId) {
        *self.enters.entry(thread).or_insert(0) += 1;
        self.active += 1;
    }

    fn foreign_bar(&self, thread: ThreadId) -> bool {
        self.bar.as_ref().is_some_and(|bar| bar.owner != thread)
    }

    /// Lifts the bar if its owner terminated. Returns whether it did.
    fn clear_dead_bar(&mut self) -> bool {
        if self.bar.as_ref().is_some_and(Bar::owner_terminated) {
            self.bar = None;
            true
        } else {
            false
        }
    }
}

/// Reentrant shared/exclusive gate protecting a resource of type `R`.
///
/// The gate owns `R` and shares it read-only through [`resource`] and the
/// sentries' `Deref`. It never hands out `&mut R`: exclusivity is a
/// cross-thread protocol, and resource types needing mutation under that
/// protocol manage their own interior mutability (see
/// [`SafeIndexedArray`]). Mutable access without any protocol is available
/// through [`get_mut`]/[`into_inner`], which require owning the gate
/// exclusively and therefore prove that no scope is outstanding.
///
/// [`resource`]: ThreadGate::resource
/// [`get_mut`]: ThreadGate::get_mut
/// [`into_inner`]: ThreadGate::into_inner
/// [`SafeIndexedArray`]: crate::safe_array::SafeIndexedArray
pub struct ThreadGate<R> {
    state: Mutex<GateState>,
    wake: Condvar,
    resource: R,
}

impl<R> ThreadGate<R> {
    /// Creates an open gate around `resource`.
    pub fn new(resource: R) -> Self {
        Self {
            state: Mutex::new(GateState {
                enters: HashMap::new(),
                active: 0,
                exclusive: None,
                bar: None,
            }),
            wake: Condvar::new(),
            resource,
        }
    }

    /// The protected resource.
    #[inline]
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Mutable access to the resource; sound because the exclusive receiver
    /// proves no sentry is outstanding.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    /// Consumes the gate and returns the resource.
    pub fn into_inner(self) -> R {
        self.resource
    }

    // ---- shared holds --------------------------------------------------

    /// Takes a shared hold, blocking as long as it takes.
    ///
    /// Granted immediately when the calling thread already holds a shared
    /// hold, owns the exclusive hold, or owns the bar; otherwise waits out
    /// any foreign bar and any closing or closed state.
    pub fn enter(&self) -> EnterSentry<'_, R> {
        let granted = self.enter_inner(None);
        debug_assert!(granted);
        EnterSentry {
            gate: self,
            _nosend: PhantomData,
        }
    }

    /// Takes a shared hold only if one is grantable right now.
    pub fn try_enter(&self) -> Option<EnterSentry<'_, R>> {
        self.enter_inner(Some(Instant::now())).then(|| EnterSentry {
            gate: self,
            _nosend: PhantomData,
        })
    }

    /// Takes a shared hold, waiting at most `timeout`.
    pub fn try_enter_for(&self, timeout: Duration) -> Option<EnterSentry<'_, R>> {
        self.enter_inner(deadline_after(timeout)).then(|| EnterSentry {
            gate: self,
            _nosend: PhantomData,
        })
    }

    // ---- the exclusive hold --------------------------------------------

    /// Takes the exclusive hold, blocking as long as it takes.
    ///
    /// Reentrant for the thread already holding the gate closed. A thread
    /// holding shared holds of its own cannot trade them up: its holds
    /// count toward the drain it is waiting on, so the attempt blocks here
    /// forever and times out in the bounded flavors.
    pub fn close(&self) -> CloseSentry<'_, R> {
        let granted = self.close_inner(None);
        debug_assert!(granted);
        CloseSentry {
            gate: self,
            _nosend: PhantomData,
        }
    }

    /// Takes the exclusive hold only if it is grantable right now.
    pub fn try_close(&self) -> Option<CloseSentry<'_, R>> {
        self.close_inner(Some(Instant::now())).then(|| CloseSentry {
            gate: self,
            _nosend: PhantomData,
        })
    }

    /// Takes the exclusive hold, waiting at most `timeout` in total across
    /// the drain and any back-out retries.
    pub fn try_close_for(&self, timeout: Duration) -> Option<CloseSentry<'_, R>> {
        self.close_inner(deadline_after(timeout)).then(|| CloseSentry {
            gate: self,
            _nosend: PhantomData,
        })
    }

    // ---- the bar -------------------------------------------------------

    /// Raises the bar, blocking as long as it takes.
    ///
    /// Reentrant for the thread already owning the bar. Installing a fresh
    /// bar takes a scaffolding shared hold first, which is what waits out
    /// any exclusive engagement; the hold is released once the bar is up.
    pub fn bar_entry(&self) -> BarSentry<'_, R> {
        let granted = self.bar_entry_inner(None);
        debug_assert!(granted);
        BarSentry {
            gate: self,
            _nosend: PhantomData,
        }
    }

    /// Raises the bar only if that needs no waiting.
    pub fn try_bar_entry(&self) -> Option<BarSentry<'_, R>> {
        self.bar_entry_inner(Some(Instant::now())).then(|| BarSentry {
            gate: self,
            _nosend: PhantomData,
        })
    }

    /// Raises the bar, waiting at most `timeout` in total across bar waits
    /// and install races.
    pub fn try_bar_entry_for(&self, timeout: Duration) -> Option<BarSentry<'_, R>> {
        self.bar_entry_inner(deadline_after(timeout)).then(|| BarSentry {
            gate: self,
            _nosend: PhantomData,
        })
    }

    // ---- queries -------------------------------------------------------

    /// Whether any thread holds the gate closed. A raised bar and a closer
    /// still draining both report `false`.
    pub fn is_closed(&self) -> bool {
        self.state
            .lock()
            .exclusive
            .as_ref()
            .is_some_and(|exclusive| exclusive.holds >= 1)
    }

    /// Whether the calling thread holds the gate closed or owns the bar;
    /// either engagement pairs with a release the caller still owes.
    pub fn is_closed_by_current_thread(&self) -> bool {
        let me = thread::current().id();
        let state = self.state.lock();
        state
            .exclusive
            .as_ref()
            .is_some_and(|exclusive| exclusive.owner == me && exclusive.holds >= 1)
            || state.bar.as_ref().is_some_and(|bar| bar.owner == me)
    }

    /// Whether the calling thread holds at least one shared hold.
    pub fn is_entered_by_current_thread(&self) -> bool {
        let me = thread::current().id();
        self.state.lock().shared_holds(me) > 0
    }

    /// Total outstanding shared holds across all threads.
    pub fn active_count(&self) -> u64 {
        self.state.lock().active
    }

    // ---- state machine -------------------------------------------------

    fn enter_inner(&self, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            // Reentrant holds and the exclusive owner's downgrade are
            // granted unconditionally; neither can deadlock the drain.
            if state.shared_holds(me) > 0
                || state
                    .exclusive
                    .as_ref()
                    .is_some_and(|exclusive| exclusive.owner == me)
            {
                state.grant_enter(me);
                return true;
            }
            if state.foreign_bar(me) {
                if state.clear_dead_bar() {
                    self.wake.notify_all();
                } else if !self.wait_watching_bar(&mut state, deadline) {
                    return false;
                }
                continue;
            }
            if state.exclusive.is_some() {
                if !self.wait(&mut state, deadline) {
                    return false;
                }
                continue;
            }
            state.grant_enter(me);
            return true;
        }
    }

    fn exit_inner(&self) {
        let mut state = self.state.lock();
        let me = thread::current().id();
        let remaining = {
            let holds = state
                .enters
                .get_mut(&me)
                .expect("shared release on a thread holding no shared hold");
            *holds -= 1;
            *holds
        };
        if remaining == 0 {
            state.enters.remove(&me);
        }
        state.active -= 1;
        if state.active == 0 {
            self.wake.notify_all();
        }
    }

    fn close_inner(&self, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        let mut state = self.state.lock();
        loop {
            if let Some(exclusive) = &mut state.exclusive {
                if exclusive.owner == me && exclusive.holds >= 1 {
                    exclusive.holds += 1;
                    return true;
                }
            }
            if state.foreign_bar(me) {
                if state.clear_dead_bar() {
                    self.wake.notify_all();
                } else if !self.wait_watching_bar(&mut state, deadline) {
                    return false;
                }
                continue;
            }
            if state.exclusive.is_some() {
                // Another thread is closing or closed.
                if !self.wait(&mut state, deadline) {
                    return false;
                }
                continue;
            }
            // Register as the closer, shutting out fresh enters, then wait
            // for the shared holds to drain.
            state.exclusive = Some(Exclusive {
                owner: me,
                holds: 0,
            });
            while state.active > 0 {
                if !self.wait(&mut state, deadline) {
                    state.exclusive = None;
                    self.wake.notify_all();
                    return false;
                }
            }
            // A reentrant entrant may have installed a bar during the
            // drain. Back out, let the bar run its course, and retry on
            // the remaining budget.
            if state.foreign_bar(me) {
                state.exclusive = None;
                self.wake.notify_all();
                continue;
            }
            state
                .exclusive
                .as_mut()
                .expect("closer record vanished mid-drain")
                .holds = 1;
            return true;
        }
    }

    fn release_close(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let remaining = {
            let exclusive = state
                .exclusive
                .as_mut()
                .filter(|exclusive| exclusive.owner == me && exclusive.holds >= 1)
                .expect("exclusive release by a thread not holding the gate closed");
            exclusive.holds -= 1;
            exclusive.holds
        };
        if remaining == 0 {
            state.exclusive = None;
            self.wake.notify_all();
        }
    }

    fn bar_entry_inner(&self, deadline: Option<Instant>) -> bool {
        let me = thread::current().id();
        loop {
            {
                let mut state = self.state.lock();
                if let Some(bar) = &mut state.bar {
                    if bar.owner == me {
                        bar.count += 1;
                        return true;
                    }
                }
                if state.bar.is_some() {
                    if state.clear_dead_bar() {
                        self.wake.notify_all();
                    } else if !self.wait_watching_bar(&mut state, deadline) {
                        return false;
                    }
                    continue;
                }
            }
            // No bar up: take a scaffolding shared hold, which waits out
            // any exclusive engagement, then re-check and install.
            if !self.enter_inner(deadline) {
                return false;
            }
            let installed = {
                let mut state = self.state.lock();
                if state.bar.is_none() {
                    state.bar = Some(Bar {
                        owner: me,
                        liveness: LIVENESS.with(Arc::downgrade),
                        count: 1,
                    });
                    true
                } else {
                    false
                }
            };
            self.exit_inner();
            if installed {
                return true;
            }
            // Lost the install race; retry on the remaining budget.
        }
    }

    fn release_bar(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let remaining = {
            let bar = state
                .bar
                .as_mut()
                .filter(|bar| bar.owner == me)
                .expect("bar release by a thread not owning the bar");
            bar.count -= 1;
            bar.count
        };
        if remaining == 0 {
            state.bar = None;
            self.wake.notify_all();
        }
    }

    /// Blocks until notified or the budget expires. Returns `false` once
    /// the budget is spent.
    fn wait(&self, state: &mut MutexGuard<'_, GateState>, deadline: Option<Instant>) -> bool {
        match deadline {
            None => {
                self.wake.wait(state);
                true
            }
            Some(deadline) => {
                if Instant::now() >= deadline {
                    return false;
                }
                self.wake.wait_until(state, deadline);
                Instant::now() < deadline
            }
        }
    }

    /// Like [`wait`], but in bounded stretches so a waiter re-checks the
    /// bar owner's liveness even when nobody ever notifies.
    ///
    /// [`wait`]: ThreadGate::wait
    fn wait_watching_bar(
        &self,
        state: &mut MutexGuard<'_, GateState>,
        deadline: Option<Instant>,
    ) -> bool {
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        let poll = Instant::now() + BAR_POLL;
        let until = match deadline {
            None => poll,
            Some(deadline) => deadline.min(poll),
        };
        self.wake.wait_until(state, until);
        deadline.map_or(true, |deadline| Instant::now() < deadline)
    }
}

impl<R: Default> Default for ThreadGate<R> {
    fn default() -> Self {
        Self::new(R::default())
    }
}

impl<R: fmt::Debug> fmt::Debug for ThreadGate<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ThreadGate")
            .field("active", &state.active)
            .field(
                "closed",
                &state
                    .exclusive
                    .as_ref()
                    .is_some_and(|exclusive| exclusive.holds >= 1),
            )
            .field("barred", &state.bar.is_some())
            .field("resource", &self.resource)
            .finish()
    }
}

/// Maps a wait budget onto a deadline; a budget too large to represent
/// means waiting indefinitely.
fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Scoped shared hold; dropping it exits the gate.
#[must_use = "dropping the sentry immediately releases the hold"]
pub struct EnterSentry<'a, R> {
    gate: &'a ThreadGate<R>,
    _nosend: PhantomData<*mut ()>,
}

impl<R> Deref for EnterSentry<'_, R> {
    type Target = R;

    #[inline]
    fn deref(&self) -> &R {
        &self.gate.resource
    }
}

impl<R> Drop for EnterSentry<'_, R> {
    fn drop(&mut self) {
        self.gate.exit_inner();
    }
}

/// Scoped exclusive hold; dropping it opens the gate again.
#[must_use = "dropping the sentry immediately reopens the gate"]
pub struct CloseSentry<'a, R> {
    gate: &'a ThreadGate<R>,
    _nosend: PhantomData<*mut ()>,
}

impl<R> Deref for CloseSentry<'_, R> {
    type Target = R;

    #[inline]
    fn deref(&self) -> &R {
        &self.gate.resource
    }
}

impl<R> Drop for CloseSentry<'_, R> {
    fn drop(&mut self) {
        self.gate.release_close();
    }
}

/// Scoped bar; dropping it lowers the bar by one reentrant step.
///
/// Carries no resource access: a bar keeps new threads out but evicts
/// nobody, so the owner has no claim the sentry could represent.
#[must_use = "dropping the sentry immediately lowers the bar"]
pub struct BarSentry<'a, R> {
    gate: &'a ThreadGate<R>,
    _nosend: PhantomData<*mut ()>,
}

impl<R> Drop for BarSentry<'_, R> {
    fn drop(&mut self) {
        self.gate.release_bar();
    }
}
