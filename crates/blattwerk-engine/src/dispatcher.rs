// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatcher — runs one request end to end.
//
// Pipeline:
//   lookup → validate (no allocation yet) → open ledger → materialise inputs
//   → handler → check outputs → package → stream → close ledger
//
// The ledger is closed on every path out of a request, including failures,
// cancellation, and timeouts.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use blattwerk_core::error::{BlattwerkError, Result};
use blattwerk_core::human_errors::printable;
use blattwerk_core::{AppConfig, Delivery, MediaType, Request, Response, sanitize_file_name};
use tracing::{debug, info, instrument, warn};

use crate::artifact::Artifact;
use crate::ledger::{CloseReport, ResourceLedger};
use crate::packager::ArtifactPackager;
use crate::params::ResolvedParams;
use crate::registry::{Cardinality, Operation, OperationRegistry};
use crate::store::EphemeralStore;

/// Cooperative cancellation flag shared between a caller and a worker.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(BlattwerkError::non_fatal("request was cancelled"));
        }
        Ok(())
    }
}

/// Metadata of a result written by [`Dispatcher::dispatch_to`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedDelivery {
    pub suggested_filename: String,
    pub media_type: MediaType,
    pub bytes_written: u64,
}

/// Input media types and parameters that passed validation.
struct Validated {
    media_types: Vec<MediaType>,
    params: ResolvedParams,
}

/// Entry point for front-ends. Cheap to clone and safe to share across
/// threads; each request gets its own ledger.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<OperationRegistry>,
    store: Arc<EphemeralStore>,
    packager: ArtifactPackager,
    config: Arc<AppConfig>,
}

impl Dispatcher {
    // -- Construction ---------------------------------------------------------

    /// Build a dispatcher with the standard operations and a store rooted at
    /// the configured scratch directory.
    pub fn new(config: AppConfig) -> Result<Self> {
        let registry = OperationRegistry::standard(&config)?;
        let store = EphemeralStore::open(config.scratch_root())?;
        Ok(Self::with_parts(registry, store, config))
    }

    pub fn with_parts(
        registry: OperationRegistry,
        store: Arc<EphemeralStore>,
        config: AppConfig,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            store,
            packager: ArtifactPackager::new(),
            config: Arc::new(config),
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<EphemeralStore> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // -- Dispatch -------------------------------------------------------------

    /// Run `request` to completion and return the result bytes.
    pub fn dispatch(&self, request: &Request) -> Result<Delivery> {
        self.dispatch_cancellable(request, &CancelToken::new())
    }

    /// Run `request`, folding any error into a client-safe [`Response`].
    pub fn respond(&self, request: &Request) -> Response {
        Response::from(self.dispatch(request))
    }

    /// Run `request`, giving up between stages once `cancel` is set.
    pub fn dispatch_cancellable(&self, request: &Request, cancel: &CancelToken) -> Result<Delivery> {
        let mut delivered = None;
        let outcome = self.execute(request, cancel, |ledger, operation, artifact| {
            let bytes = ledger.read(artifact)?;
            ledger.mark_delivered(artifact)?;
            delivered = Some(Delivery {
                bytes,
                suggested_filename: operation.suggested_filename.clone(),
                media_type: operation.delivered_media_type(),
            });
            Ok(())
        });
        outcome?;
        delivered.ok_or_else(|| BlattwerkError::fatal("no result was produced"))
    }

    /// Run `request` and stream the result into `sink` before the ledger
    /// is closed.
    pub fn dispatch_to(&self, request: &Request, sink: &mut impl Write) -> Result<StreamedDelivery> {
        let mut streamed = None;
        self.execute(request, &CancelToken::new(), |ledger, operation, artifact| {
            let bytes = ledger.read(artifact)?;
            sink.write_all(&bytes)?;
            sink.flush()?;
            ledger.mark_delivered(artifact)?;
            streamed = Some(StreamedDelivery {
                suggested_filename: operation.suggested_filename.clone(),
                media_type: operation.delivered_media_type(),
                bytes_written: bytes.len() as u64,
            });
            Ok(())
        })?;
        streamed.ok_or_else(|| BlattwerkError::fatal("no result was produced"))
    }

    /// Run `request` on the blocking pool, bounded by the configured
    /// request timeout.
    pub async fn dispatch_with_timeout(&self, request: Request) -> Result<Delivery> {
        let limit = Duration::from_secs(self.config.request_timeout_secs);
        self.dispatch_with_deadline(request, limit).await
    }

    /// Run `request` on the blocking pool, bounded by `limit`.
    ///
    /// On timeout the worker is told to stop. It may finish its current
    /// engine call, but it still closes its ledger and its result is
    /// discarded.
    #[instrument(skip_all, fields(operation = %request.operation, limit_ms = limit.as_millis() as u64))]
    pub async fn dispatch_with_deadline(&self, request: Request, limit: Duration) -> Result<Delivery> {
        let dispatcher = self.clone();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let worker = tokio::task::spawn_blocking(move || {
            dispatcher.dispatch_cancellable(&request, &worker_cancel)
        });

        match tokio::time::timeout(limit, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(BlattwerkError::fatal(format!(
                "dispatch worker failed: {join_err}"
            ))),
            Err(_) => {
                cancel.cancel();
                warn!("request timed out; worker cancelled");
                Err(BlattwerkError::non_fatal(format!(
                    "request timed out after {} ms",
                    limit.as_millis()
                )))
            }
        }
    }

    // -- Pipeline -------------------------------------------------------------

    /// Validate, run the handler inside a fresh ledger, hand the final
    /// artifact to `deliver`, and close the ledger whatever happens.
    #[instrument(skip_all, fields(operation = %request.operation, inputs = request.inputs.len()))]
    fn execute<F>(&self, request: &Request, cancel: &CancelToken, deliver: F) -> Result<()>
    where
        F: FnOnce(&mut ResourceLedger, &Operation, &Artifact) -> Result<()>,
    {
        let operation = self.registry.lookup(&request.operation)?;
        let validated = self.validate(operation, request)?;
        cancel.check()?;

        let mut ledger = self.store.open_ledger()?;
        info!(ledger = %ledger.id(), "request started");

        let outcome =
            self.run_in_ledger(&mut ledger, operation, request, &validated, cancel, deliver);
        let report = ledger.close();
        log_close(&ledger, &report);

        match &outcome {
            Ok(()) => info!(ledger = %ledger.id(), released = report.released, "request delivered"),
            Err(err) => warn!(ledger = %ledger.id(), kind = err.kind().as_str(), %err, "request failed"),
        }
        outcome
    }

    /// Check arity, media types, size, and parameters. Nothing is
    /// allocated before this succeeds.
    fn validate(&self, operation: &Operation, request: &Request) -> Result<Validated> {
        let count = request.inputs.len();
        if !operation.arity.admits(count) {
            return Err(BlattwerkError::validation(format!(
                "'{}' takes {} input(s), got {}",
                operation.name, operation.arity, count
            )));
        }

        let total = request.total_input_bytes();
        if total > self.config.max_input_bytes {
            return Err(BlattwerkError::validation(format!(
                "inputs total {} bytes, the limit is {}",
                total, self.config.max_input_bytes
            )));
        }

        let mut media_types = Vec::with_capacity(count);
        for (index, input) in request.inputs.iter().enumerate() {
            let media_type = MediaType::from_mime(&input.media_type)
                .filter(|media_type| operation.accepts(*media_type))
                .ok_or_else(|| {
                    BlattwerkError::validation(format!(
                        "input #{} has type '{}', which '{}' does not accept",
                        index + 1,
                        printable(&input.media_type),
                        operation.name
                    ))
                })?;
            media_types.push(media_type);
        }

        let params = ResolvedParams::resolve(&operation.params, &request.params)?;
        debug!(?params, "request validated");
        Ok(Validated {
            media_types,
            params,
        })
    }

    fn run_in_ledger<F>(
        &self,
        ledger: &mut ResourceLedger,
        operation: &Operation,
        request: &Request,
        validated: &Validated,
        cancel: &CancelToken,
        deliver: F,
    ) -> Result<()>
    where
        F: FnOnce(&mut ResourceLedger, &Operation, &Artifact) -> Result<()>,
    {
        let inputs = request
            .inputs
            .iter()
            .zip(&validated.media_types)
            .map(|(input, media_type)| {
                ledger.allocate(sanitize_file_name(&input.name), *media_type, &input.bytes)
            })
            .collect::<Result<Vec<_>>>()?;
        cancel.check()?;

        let outputs = operation.handler.run(&inputs, &validated.params, ledger)?;
        cancel.check()?;
        check_outputs(ledger, operation, &outputs)?;

        let result = match operation.cardinality {
            Cardinality::Single => outputs[0].clone(),
            Cardinality::Multiple => {
                self.packager
                    .pack(ledger, &outputs, &operation.suggested_filename)?
            }
        };
        cancel.check()?;
        deliver(ledger, operation, &result)
    }
}

/// A handler's outputs must match the declared cardinality and belong to
/// the request's ledger.
fn check_outputs(ledger: &ResourceLedger, operation: &Operation, outputs: &[Artifact]) -> Result<()> {
    let count_ok = match operation.cardinality {
        Cardinality::Single => outputs.len() == 1,
        Cardinality::Multiple => !outputs.is_empty(),
    };
    if !count_ok {
        return Err(BlattwerkError::fatal(format!(
            "'{}' produced {} outputs for a {:?} result",
            operation.name,
            outputs.len(),
            operation.cardinality
        )));
    }
    if let Some(stray) = outputs.iter().find(|artifact| !ledger.contains(artifact)) {
        return Err(BlattwerkError::fatal(format!(
            "'{}' returned artifact {} from another ledger",
            operation.name,
            stray.id()
        )));
    }
    Ok(())
}

fn log_close(ledger: &ResourceLedger, report: &CloseReport) {
    for failure in &report.failures {
        warn!(ledger = %ledger.id(), %failure, "release failure");
    }
    debug!(ledger = %ledger.id(), released = report.released, "ledger released");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Arity, Handler};
    use blattwerk_core::{ErrorKind, InputBlob};
    use tempfile::TempDir;

    fn echo(
        inputs: &[Artifact],
        _params: &ResolvedParams,
        ledger: &mut ResourceLedger,
    ) -> Result<Vec<Artifact>> {
        let bytes = ledger.read(&inputs[0])?;
        Ok(vec![ledger.allocate("echo.txt", MediaType::PlainText, &bytes)?])
    }

    fn nothing(
        _inputs: &[Artifact],
        _params: &ResolvedParams,
        _ledger: &mut ResourceLedger,
    ) -> Result<Vec<Artifact>> {
        Ok(Vec::new())
    }

    fn text_operation(name: &str, handler: impl Handler + 'static) -> Operation {
        Operation::new(
            name,
            Arity::exactly(1),
            &[MediaType::Pdf],
            Cardinality::Single,
            MediaType::PlainText,
            "out.txt",
            handler,
        )
    }

    fn dispatcher_with(tmp: &TempDir, config: AppConfig) -> Dispatcher {
        let mut registry = OperationRegistry::new();
        registry.register(text_operation("echo", echo)).unwrap();
        registry.register(text_operation("nothing", nothing)).unwrap();
        let store = EphemeralStore::open(tmp.path()).unwrap();
        Dispatcher::with_parts(registry, store, config)
    }

    fn dispatcher(tmp: &TempDir) -> Dispatcher {
        dispatcher_with(tmp, AppConfig::default())
    }

    fn request(operation: &str) -> Request {
        Request::new(operation).with_input(InputBlob::new("../in.pdf", MediaType::Pdf, b"hi".to_vec()))
    }

    #[test]
    fn delivers_and_releases() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let delivery = dispatcher.dispatch(&request("echo")).unwrap();
        assert_eq!(delivery.bytes, b"hi");
        assert_eq!(delivery.suggested_filename, "out.txt");
        assert!(dispatcher.store().live_artifacts().unwrap().is_empty());
    }

    #[test]
    fn dispatch_to_streams_into_sink() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let mut sink = Vec::new();
        let streamed = dispatcher.dispatch_to(&request("echo"), &mut sink).unwrap();
        assert_eq!(sink, b"hi");
        assert_eq!(streamed.bytes_written, 2);
        assert_eq!(streamed.media_type, MediaType::PlainText);
    }

    #[test]
    fn wrong_output_count_is_fatal_and_cleaned_up() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let err = dispatcher.dispatch(&request("nothing")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(matches!(err, BlattwerkError::Resource { fatal: true, .. }));
        assert!(dispatcher.store().live_artifacts().unwrap().is_empty());
    }

    #[test]
    fn cancelled_request_never_opens_a_ledger() {
        let tmp = TempDir::new().unwrap();
        let dispatcher = dispatcher(&tmp);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(dispatcher.dispatch_cancellable(&request("echo"), &cancel).is_err());
        assert_eq!(dispatcher.store().ledgers_opened(), 0);
    }

    #[test]
    fn oversized_input_is_rejected_before_allocation() {
        let tmp = TempDir::new().unwrap();
        let config = AppConfig {
            max_input_bytes: 1,
            ..AppConfig::default()
        };
        let dispatcher = dispatcher_with(&tmp, config);
        let err = dispatcher.dispatch(&request("echo")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(dispatcher.store().allocation_count(), 0);
    }

    #[test]
    fn respond_hides_details_of_unknown_operations() {
        let tmp = TempDir::new().unwrap();
        let response = dispatcher(&tmp).respond(&request("shred"));
        match response {
            Response::Failed(body) => assert_eq!(body.kind, ErrorKind::NotFound),
            Response::Delivered(_) => panic!("unknown operation delivered"),
        }
    }
}
