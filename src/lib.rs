// SPDX-License-Identifier: Apache-2.0

pub mod bounded_channel;
pub mod config;
pub mod emit;
pub mod init;
pub mod pacing;
pub mod pipeline;
pub mod sources;
