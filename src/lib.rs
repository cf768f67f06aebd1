//! Core library for the acctree command line application.
//!
//! The library loads and dumps the accounting hierarchy of a cluster
//! (accounts nested under accounts, users bound to accounts, and the limits
//! each binding carries) using a line-oriented text format. Text handling
//! lives under [`acctree::tools::io`], entity types in
//! [`acctree::tools::model`], draft construction in [`acctree::tools::build`],
//! parent tracking in [`acctree::tools::hierarchy`], diffing against live state
//! in [`acctree::tools::reconcile`], and the load/dump entry points in
//! [`acctree::tools::sync`].

pub mod acctree;

pub use acctree::tools::{
    Diagnostic, ParseError, Result, ToolError, build, error, hierarchy, io, model, reconcile,
    sync, tree,
};
