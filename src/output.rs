//! Callback outputs and the single stream type the engine consumes.
//!
//! A callback may produce its outputs eagerly through an iterator, lazily
//! through an async stream, run a future that produces nothing, or return
//! nothing at all. [`CallbackOutput::into_stream`] turns every shape into an
//! [`OutputStream`] so the engine only ever drives one abstraction.

use crate::error::SpiderError;
use crate::item::Item;
use crate::request::Request;
use crate::response::Response;
use futures_util::future::{self, BoxFuture};
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use std::any::{Any, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// The normalized output stream of one callback invocation.
pub type OutputStream = BoxStream<'static, Result<Output, SpiderError>>;

/// Something a callback produced: more work or a result.
#[derive(Debug)]
pub enum Output {
    Request(Request),
    Item(Item),
}

impl Output {
    /// Admits a dynamically typed value as an output.
    ///
    /// Only `Request`, `Item` and `Output` are accepted; anything else is a
    /// [`SpiderError::InvalidOutput`], which stops the crawl.
    pub fn try_from_value<T: Any + Send>(value: T) -> Result<Output, SpiderError> {
        let boxed: Box<dyn Any + Send> = Box::new(value);
        let boxed = match boxed.downcast::<Request>() {
            Ok(request) => return Ok(Output::Request(*request)),
            Err(other) => other,
        };
        let boxed = match boxed.downcast::<Item>() {
            Ok(item) => return Ok(Output::Item(*item)),
            Err(other) => other,
        };
        match boxed.downcast::<Output>() {
            Ok(output) => Ok(*output),
            Err(_) => Err(SpiderError::InvalidOutput {
                type_name: type_name::<T>(),
            }),
        }
    }
}

impl From<Request> for Output {
    fn from(request: Request) -> Self {
        Output::Request(request)
    }
}

impl From<Item> for Output {
    fn from(item: Item) -> Self {
        Output::Item(item)
    }
}

/// What a callback hands back to the engine.
#[derive(Default)]
pub enum CallbackOutput {
    #[default]
    None,
    Stream(OutputStream),
    /// Work that runs to completion without producing outputs.
    Future(BoxFuture<'static, Result<(), SpiderError>>),
}

impl CallbackOutput {
    /// A callback result with no outputs.
    pub fn none() -> Self {
        CallbackOutput::None
    }

    /// Outputs pulled lazily from a synchronous iterator.
    pub fn iter<I>(outputs: I) -> Self
    where
        I: IntoIterator,
        I::IntoIter: Send + 'static,
        I::Item: Into<Output>,
    {
        let outputs = outputs.into_iter().map(|output| Ok(output.into()));
        CallbackOutput::Stream(stream::iter(outputs).boxed())
    }

    /// Like [`CallbackOutput::iter`] for iterators that can fail mid-way.
    pub fn try_iter<I>(outputs: I) -> Self
    where
        I: IntoIterator<Item = Result<Output, SpiderError>>,
        I::IntoIter: Send + 'static,
    {
        CallbackOutput::Stream(stream::iter(outputs).boxed())
    }

    /// Outputs produced by an async stream.
    pub fn stream<S>(outputs: S) -> Self
    where
        S: Stream<Item = Result<Output, SpiderError>> + Send + 'static,
    {
        CallbackOutput::Stream(outputs.boxed())
    }

    /// Wraps an async callback body that resolves to a list of outputs.
    pub fn future<F>(work: F) -> Self
    where
        F: Future<Output = Result<(), SpiderError>> + Send + 'static,
    {
        CallbackOutput::Future(Box::pin(work))
    }

    /// Normalizes every shape into one stream; a future's error surfaces as the stream's only element.
    pub fn into_stream(self) -> OutputStream {
        match self {
            CallbackOutput::None => stream::empty().boxed(),
            CallbackOutput::Stream(outputs) => outputs,
            CallbackOutput::Future(work) => stream::once(work)
                .filter_map(|result| future::ready(result.err().map(Err::<Output, SpiderError>)))
                .boxed(),
        }
    }
}

impl fmt::Debug for CallbackOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackOutput::None => f.write_str("CallbackOutput::None"),
            CallbackOutput::Stream(_) => f.write_str("CallbackOutput::Stream(..)"),
            CallbackOutput::Future(_) => f.write_str("CallbackOutput::Future(..)"),
        }
    }
}

/// A response handler attached to a request.
#[derive(Clone)]
pub struct Callback(Arc<dyn Fn(Response) -> CallbackOutput + Send + Sync>);

impl Callback {
    /// Wraps a closure as a per-request callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Response) -> CallbackOutput + Send + Sync + 'static,
    {
        Callback(Arc::new(callback))
    }

    /// Invokes the callback on `response`.
    pub fn call(&self, response: Response) -> CallbackOutput {
        (self.0)(response)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}
