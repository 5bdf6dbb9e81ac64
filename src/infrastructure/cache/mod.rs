// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 缓存模块
///
/// 提供 robots 文档缓存与 Redis 客户端
pub mod policy_cache;
pub mod redis_client;
