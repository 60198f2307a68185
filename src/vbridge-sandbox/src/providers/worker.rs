use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use rquickjs::{Context as JsContext, Function, Runtime as JsRuntime};
use vbridge_wire::{EngineError, Result, Value};

use crate::js_bridge;
use crate::traits::{Context, EvalMode, HostFn, Provider, Runtime};

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

enum Job {
    Eval {
        code: String,
        reply: tokio::sync::oneshot::Sender<Result<Value>>,
    },
    SetGlobal {
        name: String,
        value: Value,
        reply: mpsc::Sender<Result<()>>,
    },
    GetGlobal {
        name: String,
        reply: mpsc::Sender<Result<Value>>,
    },
    SetHostFunction {
        name: String,
        f: HostFn,
        reply: mpsc::Sender<Result<()>>,
    },
    Shutdown,
}

/// OS-thread-hosted sandbox. Runs a dedicated QuickJS heap on its own
/// thread and communicates over a channel, so a Host-side future is the
/// only unit of cancellation available to callers — a hung guest loop
/// still occupies the worker thread until the process is torn down
/// (spec.md §4.1 capability matrix: "hard timeout: no").
pub struct WorkerProvider;

impl WorkerProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WorkerProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for WorkerProvider {
    fn name(&self) -> &'static str {
        "worker"
    }

    fn create_runtime(&self) -> Result<Box<dyn Runtime>> {
        Ok(Box::new(WorkerRuntime { handles: Vec::new() }))
    }
}

struct WorkerRuntime {
    handles: Vec<JoinHandle<()>>,
}

impl Runtime for WorkerRuntime {
    fn create_context(&mut self) -> Result<Box<dyn Context>> {
        let (tx, rx) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name(format!("vbridge-worker-{}", NEXT_ID.load(Ordering::Relaxed)))
            .spawn(move || worker_loop(rx))
            .map_err(|err| EngineError::ExecutionError(format!("spawn worker thread: {err}")))?;
        self.handles.push(handle);
        let id = format!("worker-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed));
        Ok(Box::new(WorkerContext { id, tx }))
    }

    fn dispose(self: Box<Self>) {
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(rx: mpsc::Receiver<Job>) {
    let runtime = match JsRuntime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            tracing::error!(error = %err, "worker thread failed to start rquickjs runtime");
            return;
        }
    };
    let ctx = match JsContext::full(&runtime) {
        Ok(ctx) => ctx,
        Err(err) => {
            tracing::error!(error = %err, "worker thread failed to create rquickjs context");
            return;
        }
    };

    while let Ok(job) = rx.recv() {
        match job {
            Job::Eval { code, reply } => {
                let result = ctx.with(|ctx| js_bridge::eval_to_value(&ctx, &code));
                let _ = reply.send(result);
            }
            Job::SetGlobal { name, value, reply } => {
                let result = ctx.with(|ctx| js_bridge::set_global_json(&ctx, &name, &value));
                let _ = reply.send(result);
            }
            Job::GetGlobal { name, reply } => {
                let result = ctx.with(|ctx| js_bridge::get_global_value(&ctx, &name));
                let _ = reply.send(result);
            }
            Job::SetHostFunction { name, f, reply } => {
                let result = ctx.with(|ctx| {
                    let wrapped = Function::new(ctx.clone(), move |args: rquickjs::Rest<rquickjs::Value>| -> rquickjs::Result<rquickjs::Value> {
                        let mut values = Vec::with_capacity(args.len());
                        for arg in args.0 {
                            values.push(js_bridge::js_to_value(&ctx, arg).unwrap_or(Value::Null));
                        }
                        let result = f(values);
                        let json = serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());
                        let globals = ctx.globals();
                        let json_obj: rquickjs::Object = globals.get("JSON")?;
                        let parse: Function = json_obj.get("parse")?;
                        parse.call((json,))
                    })
                    .map_err(|err| EngineError::ExecutionError(err.to_string()));
                    wrapped.and_then(|wrapped| {
                        ctx.globals()
                            .set(&name, wrapped)
                            .map_err(|err| EngineError::ExecutionError(err.to_string()))
                    })
                });
                let _ = reply.send(result);
            }
            Job::Shutdown => break,
        }
    }
}

struct WorkerContext {
    id: String,
    tx: mpsc::Sender<Job>,
}

impl Context for WorkerContext {
    fn id(&self) -> &str {
        &self.id
    }

    fn eval_mode(&self) -> EvalMode {
        EvalMode::AsyncOnly
    }

    fn eval_async<'a>(&'a mut self, code: &'a str) -> BoxFuture<'a, Result<Value>> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        let send_result = self.tx.send(Job::Eval {
            code: code.to_string(),
            reply: reply_tx,
        });
        Box::pin(async move {
            send_result
                .map_err(|_| EngineError::Destroyed)?;
            reply_rx.await.map_err(|_| EngineError::Destroyed)?
        })
    }

    fn set_global(&mut self, name: &str, value: Value) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Job::SetGlobal {
                name: name.to_string(),
                value,
                reply: reply_tx,
            })
            .map_err(|_| EngineError::Destroyed)?;
        reply_rx.recv().map_err(|_| EngineError::Destroyed)?
    }

    fn get_global(&self, name: &str) -> Result<Value> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Job::GetGlobal {
                name: name.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| EngineError::Destroyed)?;
        reply_rx.recv().map_err(|_| EngineError::Destroyed)?
    }

    fn set_host_function(&mut self, name: &str, f: HostFn) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Job::SetHostFunction {
                name: name.to_string(),
                f,
                reply: reply_tx,
            })
            .map_err(|_| EngineError::Destroyed)?;
        reply_rx.recv().map_err(|_| EngineError::Destroyed)?
    }

    fn dispose(self: Box<Self>) {
        let _ = self.tx.send(Job::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn eval_round_trips_across_the_thread_boundary() {
        let provider = WorkerProvider::new();
        let mut runtime = provider.create_runtime().unwrap();
        let mut ctx = runtime.create_context().unwrap();
        let value = ctx.eval_async("21 * 2").await.unwrap();
        assert_eq!(value, Value::Num(42.0));
    }

    #[test]
    fn eval_mode_is_async_only() {
        let provider = WorkerProvider::new();
        let mut runtime = provider.create_runtime().unwrap();
        let ctx = runtime.create_context().unwrap();
        assert_eq!(ctx.eval_mode(), EvalMode::AsyncOnly);
    }
}
