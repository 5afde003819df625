//! Discord Integration - gateway bot interface for the LOA workflow
//!
//! This crate provides the Discord side of the LOA bot:
//! - **Gateway** (`gateway`, `websocket`) - websocket session with heartbeat and reconnection
//! - **Events** (`events`, `payload`) - interaction decoding and routing
//! - **Workflow** (`workflow`) - post form, open modal, forward submission, resolve review
//! - **Components** (`components`) - embed, select menu, modal and button builders
//! - **REST** (`api`, `http`, `channels`, `commands`) - outbound calls and command registration
//!
//! # Architecture
//!
//! ```text
//! Discord Gateway → GatewayRunner → EventDispatcher → Handlers → LoaWorkflow
//!                                                                   ↓
//!                                      ChannelResolver + DiscordApi (REST)
//! ```
//!
//! # Key Types
//!
//! - `GatewayRunner` - event loop with reconnection logic
//! - `EventDispatcher` - routes interactions to the handler for their kind
//! - `LoaWorkflow` - the LOA state machine behind every handler
//! - `DiscordApi` - trait over the REST calls the workflow makes

pub mod api;
pub mod channels;
pub mod commands;
pub mod components;
pub mod events;
pub mod gateway;
pub mod http;
pub mod payload;
pub mod websocket;
pub mod workflow;
