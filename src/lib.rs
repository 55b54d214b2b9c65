// Copyright 2026 Nano Election Tracker contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Live telemetry aggregator for block elections on a representative-voting
//! network: subscribes to a node's vote/election event stream, cross
//! references representative weights and quorum parameters, and serves a
//! ranked, deduplicated overview over HTTP and websocket.

pub mod aggregator;
pub mod cache;
pub mod detail;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod known;
pub mod logging;
pub mod merger;
pub mod model;
pub mod overview;
pub mod queue;
pub mod registry;
pub mod rpc;
pub mod server;
pub mod settings;
pub mod upstream;
