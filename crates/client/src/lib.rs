//! Client-side offline worker for tether.
//!
//! This crate provides the network layer (request/response model, URL
//! canonicalization, exclusion rules, reqwest-backed fetching) and the
//! worker that installs, activates and intercepts on top of a cache store.

pub mod fetch;
pub mod worker;

pub use fetch::{
    Destination, Exclusion, ExclusionRules, FetchClient, FetchConfig, FetchRequest, FetchResponse, Network,
    OFFLINE_BODY, ResponseType,
};

pub use worker::{
    ActivationReport, Delivery, EvictionReport, FetchOutcome, HeadlessHost, Host, Passthrough, Registration,
    ServiceWorker, Source, WorkerState,
};
