//! Client for the dashboard server's JSON endpoints.

pub mod client;
pub mod listing;

pub use client::DashboardClient;
pub use listing::{
    BrokerRow, Cell, Column, GridRow, GroupRow, MemberRow, OffsetRow, PartitionRow, Table,
    TopicRow, decode_page,
};
