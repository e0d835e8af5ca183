//! # MSSQL MCP Server
//!
//! A Model Context Protocol (MCP) server for Microsoft SQL Server.
//!
//! This crate provides:
//! - **Config Resolver**: turns `MSSQL_*` environment variables into a
//!   [`ConnectionConfig`], applying Azure and LocalDB adjustments
//! - **Query Gate**: the only path to the database; table names pass an
//!   identifier allow-list, values are bound as parameters
//! - **Tools**: `list-tables`, `query-database`, `describe-table`
//! - **Resources**: first rows of each table as `mssql://<schema.table>/data`

pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod handlers;
pub mod resources;
pub mod security;
pub mod server;
pub mod tools;

pub use config::ConnectionConfig;
pub use database::{QueryGate, QueryOutcome};
pub use error::ServerError;
pub use server::MssqlMcpServer;
