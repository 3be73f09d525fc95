// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// blattwerk-engine — Request orchestration for Blattwerk.
//
// A `Dispatcher` looks an operation up in the `OperationRegistry`, validates
// the request against its contract, and runs the handler inside a
// `ResourceLedger` that owns every intermediate artifact. Multi-file results
// are bundled by the `ArtifactPackager`. The ledger is closed on every exit
// path, so nothing outlives the request in the `EphemeralStore`.

pub mod artifact;
pub mod dispatcher;
pub mod handlers;
pub mod ledger;
pub mod packager;
pub mod params;
pub mod registry;
pub mod store;

pub use artifact::{Artifact, ArtifactId};
pub use dispatcher::{CancelToken, Dispatcher, StreamedDelivery};
pub use ledger::{CloseReport, Disposition, LedgerState, ResourceLedger};
pub use packager::ArtifactPackager;
pub use params::{ParamKind, ParamSpec, ResolvedParams};
pub use registry::{Arity, Cardinality, Handler, Operation, OperationRegistry};
pub use store::EphemeralStore;
