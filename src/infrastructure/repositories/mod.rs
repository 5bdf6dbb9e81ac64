// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供去重存储的数据库实现和内存实现
pub mod crawl_record_repo_impl;
pub mod memory_record_repo;
