// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 配置模块
///
/// 处理应用程序的配置设置和环境变量
pub mod config;

/// 领域模块
///
/// 包含爬取任务、已爬取记录、链接范围和仓库接口
pub mod domain;

/// 引擎模块
///
/// 页面抓取与 HTML 解析
pub mod engines;

/// 基础设施模块
///
/// 提供数据库、缓存、指标等外部服务集成
pub mod infrastructure;

/// 队列模块
///
/// 前沿队列与任务发送器
pub mod queue;

/// 工具模块
///
/// 提供通用的工具函数和辅助功能
pub mod utils;

/// 工作器模块
///
/// 实现任务处理状态机和工作器管理
pub mod workers;
