// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 队列模块
///
/// 提供分区的前沿任务队列（Redis Streams 与进程内两种后端）以及任务发送器
pub mod emitter;
pub mod memory_queue;
pub mod redis_stream_queue;
pub mod task_queue;
