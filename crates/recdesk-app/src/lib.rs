// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod bulk;
pub mod codec;
pub mod command;
pub mod engine;
pub mod forms;
pub mod ids;
pub mod keys;
pub mod list;
pub mod model;
pub mod render;
pub mod resources;
pub mod search;
pub mod staging;
pub mod state;

pub use bulk::*;
pub use codec::*;
pub use command::*;
pub use engine::*;
pub use forms::*;
pub use ids::*;
pub use keys::*;
pub use list::*;
pub use model::*;
pub use resources::*;
pub use search::*;
pub use staging::*;
pub use state::*;
