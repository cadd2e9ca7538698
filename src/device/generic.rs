use crate::device::{Domain, Event, Tag};
use crate::error::{ReadError, ReaderError};
use crate::queue::{Queue, QueueReader};
use std::sync::Arc;

/// Shared handle to an emitter: derives one [`Event`] from a state.
pub type EmitterFn<S, E> = Arc<dyn Fn(&S) -> Event<E> + Send + Sync>;

type ResolveFn<I, O> = Arc<dyn Fn(&I) -> O + Send + Sync>;
type TransitionFn<S, I, O> = Arc<dyn Fn(&S, &I, &O) -> S + Send + Sync>;

/// Wrap a closure as an [`EmitterFn`].
pub fn emitter<S, E: Tag>(f: impl Fn(&S) -> Event<E> + Send + Sync + 'static) -> EmitterFn<S, E> {
    Arc::new(f)
}

/// Input-filtered, state-evolving, event-emitting processor.
///
/// A device is an immutable function bundle — input domain, output domain,
/// resolution, state transition, ordered emitters — plus a mutable state
/// and two owned queues it publishes to. Devices compose into graphs by
/// binding one device's input reader to another's output queue.
///
/// The owned queues outlive any reader attached to them for as long as the
/// device itself lives. Cloning a device copies the function bundle only:
/// the copy starts with fresh empty queues, a default state and no input.
pub struct Device<I, O, S, E: Tag> {
    input_domain: Domain<I>,
    output_domain: Domain<O>,
    resolve: ResolveFn<I, O>,
    transition: TransitionFn<S, I, O>,
    emitters: Vec<EmitterFn<S, E>>,
    output_queue: Arc<Queue<O>>,
    event_queue: Arc<Queue<Event<E>>>,
    input: QueueReader<I>,
    state: S,
}

impl<I, O, S, E> Device<I, O, S, E>
where
    I: 'static,
    O: 'static,
    S: Default + Clone + 'static,
    E: Tag,
{
    pub fn new(
        input_domain: Domain<I>,
        output_domain: Domain<O>,
        resolve: impl Fn(&I) -> O + Send + Sync + 'static,
        transition: impl Fn(&S, &I, &O) -> S + Send + Sync + 'static,
        emitters: Vec<EmitterFn<S, E>>,
    ) -> Self {
        Self {
            input_domain,
            output_domain,
            resolve: Arc::new(resolve),
            transition: Arc::new(transition),
            emitters,
            output_queue: Queue::new_arc(),
            event_queue: Queue::new_arc(),
            input: QueueReader::new(),
            state: S::default(),
        }
    }

    /// Bind this device's input to `upstream`'s output queue.
    pub fn connect<UI, US, UE: Tag>(&mut self, upstream: &Device<UI, I, US, UE>) {
        self.input.connect(&upstream.output_queue);
    }

    /// Adopt `reader` as this device's input.
    ///
    /// Fails with [`ReaderError::Expired`] if the reader is already dead.
    pub fn connect_reader(&mut self, reader: QueueReader<I>) -> Result<(), ReaderError> {
        if reader.expired() {
            return Err(ReaderError::Expired);
        }

        self.input = reader;
        Ok(())
    }

    /// Bind an external reader to this device's output queue.
    pub fn connect_output(&self, reader: &mut QueueReader<O>) {
        reader.connect(&self.output_queue);
    }

    /// Bind an external reader to this device's event queue.
    pub fn connect_event(&self, reader: &mut QueueReader<Event<E>>) {
        reader.connect(&self.event_queue);
    }

    /// A fresh reader over the output queue.
    pub fn output_reader(&self) -> QueueReader<O> {
        QueueReader::from_queue(&self.output_queue)
    }

    /// A fresh reader over the event queue.
    pub fn event_reader(&self) -> QueueReader<Event<E>> {
        QueueReader::from_queue(&self.event_queue)
    }

    /// Drop the input attachment.
    pub fn disconnect(&mut self) {
        self.input.disconnect();
    }

    /// Run one pipeline step on `input`.
    ///
    /// Returns `false` without side effects when the input domain rejects
    /// the input. Otherwise: the resolved output is published iff the output
    /// domain admits it (rejection does not abort the step), the state
    /// advances through the transition function, and every emitter enqueues
    /// its event derived from the new state, in order.
    pub fn read_input(&mut self, input: I) -> bool {
        if !self.input_domain.contains(&input) {
            return false;
        }

        let output = (self.resolve)(&input);
        let publish = self.output_domain.contains(&output);
        let next = (self.transition)(&self.state, &input, &output);

        if publish {
            self.output_queue.enqueue(output);
        }

        for emit in &self.emitters {
            self.event_queue.enqueue(emit(&next));
        }

        self.state = next;

        true
    }

    /// Pull one input from the connected reader and run the pipeline step.
    ///
    /// Fails with [`ReadError::NoInput`] when no live input is attached;
    /// returns `Ok(false)` when the input is attached but empty (including
    /// losing a dequeue race to another reader).
    pub fn read(&mut self) -> Result<bool, ReadError> {
        match self.input.try_dequeue() {
            Err(_) => Err(ReadError::NoInput),
            Ok(None) => Ok(false),
            Ok(Some(input)) => Ok(self.read_input(input)),
        }
    }

    /// The current state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Compose two devices into one.
    ///
    /// The composite admits the union of the input domains and publishes
    /// into the union of the output domains; its emitter list is `self`'s
    /// followed by `other`'s. Resolution and transition dispatch on the
    /// input: when `self`'s input domain admits it, `self`'s functions run,
    /// otherwise `other`'s. The composite starts detached, with fresh
    /// queues and a default state.
    pub fn combine(&self, other: &Self) -> Self {
        let input_domain = self.input_domain.or(&other.input_domain);
        let output_domain = self.output_domain.or(&other.output_domain);

        let route = self.input_domain.clone();
        let left_resolve = self.resolve.clone();
        let right_resolve = other.resolve.clone();
        let resolve: ResolveFn<I, O> = Arc::new(move |input| {
            if route.contains(input) {
                left_resolve(input)
            } else {
                right_resolve(input)
            }
        });

        let route = self.input_domain.clone();
        let left_transition = self.transition.clone();
        let right_transition = other.transition.clone();
        let transition: TransitionFn<S, I, O> = Arc::new(move |state, input, output| {
            if route.contains(input) {
                left_transition(state, input, output)
            } else {
                right_transition(state, input, output)
            }
        });

        let mut emitters = self.emitters.clone();
        emitters.extend(other.emitters.iter().cloned());

        Self {
            input_domain,
            output_domain,
            resolve,
            transition,
            emitters,
            output_queue: Queue::new_arc(),
            event_queue: Queue::new_arc(),
            input: QueueReader::new(),
            state: S::default(),
        }
    }
}

impl<I, O, S, E> Clone for Device<I, O, S, E>
where
    S: Default + Clone,
    E: Tag,
{
    fn clone(&self) -> Self {
        Self {
            input_domain: self.input_domain.clone(),
            output_domain: self.output_domain.clone(),
            resolve: self.resolve.clone(),
            transition: self.transition.clone(),
            emitters: self.emitters.clone(),
            output_queue: Queue::new_arc(),
            event_queue: Queue::new_arc(),
            input: QueueReader::new(),
            state: S::default(),
        }
    }
}
