use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{Handle, RequestHandler};
use crate::request::{type_name, Request};

#[cfg(feature = "async")]
use super::async_handler::{AsyncRequestHandler, HandleAsync};

/// Which side of the handler body a step runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Timing {
    Before,
    After,
}

type StepFactory<R> = Arc<dyn Fn() -> Box<dyn RequestHandler<R>> + Send + Sync>;
type HandlerFactory<R> = Arc<dyn Fn() -> Box<dyn Handle<R>> + Send + Sync>;

/// Declarative description of one pipeline step.
///
/// The factory captures the step's initializer arguments and is called once
/// per dispatch.
pub struct StepDescriptor<R: Request> {
    step: u32,
    timing: Timing,
    factory: StepFactory<R>,
}

impl<R: Request> Clone for StepDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            step: self.step,
            timing: self.timing,
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<R: Request> StepDescriptor<R> {
    pub fn new<F, S>(step: u32, timing: Timing, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: RequestHandler<R> + 'static,
    {
        Self {
            step,
            timing,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn RequestHandler<R>>),
        }
    }

    /// Step that runs before the body; each dispatch gets a clone of `prototype`.
    pub fn before<S>(step: u32, prototype: S) -> Self
    where
        S: RequestHandler<R> + Clone + Sync + 'static,
    {
        Self::new(step, Timing::Before, move || prototype.clone())
    }

    /// Step that runs after the body has completed.
    pub fn after<S>(step: u32, prototype: S) -> Self
    where
        S: RequestHandler<R> + Clone + Sync + 'static,
    {
        Self::new(step, Timing::After, move || prototype.clone())
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn create(&self) -> Box<dyn RequestHandler<R>> {
        (self.factory)()
    }
}

/// A business handler plus the steps declared around it.
pub struct HandlerRegistration<R: Request> {
    name: String,
    factory: HandlerFactory<R>,
    steps: Vec<StepDescriptor<R>>,
}

impl<R: Request> Clone for HandlerRegistration<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            factory: Arc::clone(&self.factory),
            steps: self.steps.clone(),
        }
    }
}

impl<R: Request> HandlerRegistration<R> {
    pub fn new<F, H>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: Handle<R> + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Handle<R>>),
            steps: Vec::new(),
        }
    }

    /// Declare a step. Order of declaration does not matter.
    pub fn step(mut self, descriptor: StepDescriptor<R>) -> Self {
        self.steps.push(descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDescriptor<R>] {
        &self.steps
    }

    pub fn create_handler(&self) -> Box<dyn Handle<R>> {
        (self.factory)()
    }
}

#[cfg(feature = "async")]
type AsyncStepFactory<R> = Arc<dyn Fn() -> Box<dyn AsyncRequestHandler<R>> + Send + Sync>;
#[cfg(feature = "async")]
type AsyncHandlerFactory<R> = Arc<dyn Fn() -> Box<dyn HandleAsync<R>> + Send + Sync>;

#[cfg(feature = "async")]
pub struct AsyncStepDescriptor<R: Request> {
    step: u32,
    timing: Timing,
    factory: AsyncStepFactory<R>,
}

#[cfg(feature = "async")]
impl<R: Request> Clone for AsyncStepDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            step: self.step,
            timing: self.timing,
            factory: Arc::clone(&self.factory),
        }
    }
}

#[cfg(feature = "async")]
impl<R: Request> AsyncStepDescriptor<R> {
    pub fn new<F, S>(step: u32, timing: Timing, factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: AsyncRequestHandler<R> + 'static,
    {
        Self {
            step,
            timing,
            factory: Arc::new(move || Box::new(factory()) as Box<dyn AsyncRequestHandler<R>>),
        }
    }

    pub fn before<S>(step: u32, prototype: S) -> Self
    where
        S: AsyncRequestHandler<R> + Clone + Sync + 'static,
    {
        Self::new(step, Timing::Before, move || prototype.clone())
    }

    pub fn after<S>(step: u32, prototype: S) -> Self
    where
        S: AsyncRequestHandler<R> + Clone + Sync + 'static,
    {
        Self::new(step, Timing::After, move || prototype.clone())
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn create(&self) -> Box<dyn AsyncRequestHandler<R>> {
        (self.factory)()
    }
}

#[cfg(feature = "async")]
pub struct AsyncHandlerRegistration<R: Request> {
    name: String,
    factory: AsyncHandlerFactory<R>,
    steps: Vec<AsyncStepDescriptor<R>>,
}

#[cfg(feature = "async")]
impl<R: Request> Clone for AsyncHandlerRegistration<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            factory: Arc::clone(&self.factory),
            steps: self.steps.clone(),
        }
    }
}

#[cfg(feature = "async")]
impl<R: Request> AsyncHandlerRegistration<R> {
    pub fn new<F, H>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> H + Send + Sync + 'static,
        H: HandleAsync<R> + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(move || Box::new(factory()) as Box<dyn HandleAsync<R>>),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, descriptor: AsyncStepDescriptor<R>) -> Self {
        self.steps.push(descriptor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[AsyncStepDescriptor<R>] {
        &self.steps
    }

    pub fn create_handler(&self) -> Box<dyn HandleAsync<R>> {
        (self.factory)()
    }
}

/// Request type to handler registrations, built once at startup.
///
/// Sync and async registrations live in separate tables; `send` only sees the
/// sync table and `send_async` only the async one.
#[derive(Default)]
pub struct HandlerRegistry {
    sync: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    #[cfg(feature = "async")]
    asynchronous: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<R: Request>(&mut self, registration: HandlerRegistration<R>) -> &mut Self {
        let entry = self
            .sync
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Vec::<HandlerRegistration<R>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<HandlerRegistration<R>>>() {
            list.push(registration);
        }
        self
    }

    /// Register a handler with no steps, named after its type.
    pub fn register<R, H, F>(&mut self, factory: F) -> &mut Self
    where
        R: Request,
        H: Handle<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.add(HandlerRegistration::new(type_name::<H>(), factory))
    }

    pub fn registrations<R: Request>(&self) -> &[HandlerRegistration<R>] {
        self.sync
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Vec<HandlerRegistration<R>>>())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        #[cfg(feature = "async")]
        {
            self.sync.is_empty() && self.asynchronous.is_empty()
        }
        #[cfg(not(feature = "async"))]
        {
            self.sync.is_empty()
        }
    }

    #[cfg(feature = "async")]
    pub fn add_async<R: Request>(&mut self, registration: AsyncHandlerRegistration<R>) -> &mut Self {
        let entry = self
            .asynchronous
            .entry(TypeId::of::<R>())
            .or_insert_with(|| Box::new(Vec::<AsyncHandlerRegistration<R>>::new()));
        if let Some(list) = entry.downcast_mut::<Vec<AsyncHandlerRegistration<R>>>() {
            list.push(registration);
        }
        self
    }

    #[cfg(feature = "async")]
    pub fn register_async<R, H, F>(&mut self, factory: F) -> &mut Self
    where
        R: Request,
        H: HandleAsync<R> + 'static,
        F: Fn() -> H + Send + Sync + 'static,
    {
        self.add_async(AsyncHandlerRegistration::new(type_name::<H>(), factory))
    }

    #[cfg(feature = "async")]
    pub fn registrations_async<R: Request>(&self) -> &[AsyncHandlerRegistration<R>] {
        self.asynchronous
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Vec<AsyncHandlerRegistration<R>>>())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
