//! 配置校验模块
//!
//! 校验规则：
//! - 至少一个监听地址，格式为 host:port
//! - 至少一个上游，地址格式为 host:port，名称唯一
//! - backoff: unit_ms > 0 且 max_ms >= unit_ms
//! - write_timeout_ms > 0，队列容量 > 0
//! - keepalive_secs 在 1..=32767 之间，accept_retry_ms > 0
//! - metrics.listen 为合法的 socket 地址

use std::collections::HashSet;
use std::net::SocketAddr;

use contracts::{ContractError, ProxyBlueprint};

/// 校验 ProxyBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    validate_listen(blueprint)?;
    validate_upstreams(blueprint)?;
    validate_backoff(blueprint)?;
    validate_proxy_limits(blueprint)?;
    validate_metrics(blueprint)?;
    Ok(())
}

/// 校验 `host:port` 格式 (端口为数字，host 非空)
///
/// IPv6 地址需使用方括号，例如 `[::1]:30005`。
fn check_host_port(field: String, addr: &str) -> Result<(), ContractError> {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return Err(ContractError::config_validation(
            field,
            format!("'{addr}' must be host:port"),
        ));
    };

    if host.is_empty() {
        return Err(ContractError::config_validation(
            field,
            format!("'{addr}' has an empty host"),
        ));
    }

    if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
        return Err(ContractError::config_validation(
            field,
            format!("'{addr}': IPv6 hosts must be bracketed"),
        ));
    }

    if port.parse::<u16>().is_err() {
        return Err(ContractError::config_validation(
            field,
            format!("'{addr}' has an invalid port '{port}'"),
        ));
    }

    Ok(())
}

/// 校验监听地址
fn validate_listen(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    if blueprint.proxy.listen.is_empty() {
        return Err(ContractError::config_validation(
            "proxy.listen",
            "at least one listen address is required",
        ));
    }
    for (idx, addr) in blueprint.proxy.listen.iter().enumerate() {
        check_host_port(format!("proxy.listen[{idx}]"), addr)?;
    }
    Ok(())
}

/// 校验上游地址与名称唯一性
fn validate_upstreams(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    if blueprint.upstreams.is_empty() {
        return Err(ContractError::config_validation(
            "upstreams",
            "at least one upstream is required",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, upstream) in blueprint.upstreams.iter().enumerate() {
        check_host_port(format!("upstreams[{idx}].addr"), &upstream.addr)?;

        if !seen.insert(upstream.display_name()) {
            return Err(ContractError::config_validation(
                format!("upstreams[{idx}]"),
                format!("duplicate upstream name '{}'", upstream.display_name()),
            ));
        }
    }
    Ok(())
}

/// 校验重连退避参数
fn validate_backoff(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    let backoff = &blueprint.backoff;

    if backoff.unit_ms == 0 {
        return Err(ContractError::config_validation(
            "backoff.unit_ms",
            "unit_ms must be > 0",
        ));
    }

    if backoff.max_ms < backoff.unit_ms {
        return Err(ContractError::config_validation(
            "backoff.unit_ms / backoff.max_ms",
            format!(
                "max_ms ({}) must be >= unit_ms ({})",
                backoff.max_ms, backoff.unit_ms
            ),
        ));
    }

    Ok(())
}

/// Linux 上 TCP_KEEPIDLE 的上限
const MAX_KEEPALIVE_SECS: u64 = 32_767;

/// 校验写超时、队列容量、keep-alive 与 accept 重试间隔
fn validate_proxy_limits(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    let proxy = &blueprint.proxy;

    if proxy.write_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "proxy.write_timeout_ms",
            "write_timeout_ms must be > 0",
        ));
    }
    if proxy.frame_queue == 0 {
        return Err(ContractError::config_validation(
            "proxy.frame_queue",
            "frame_queue must be > 0",
        ));
    }
    if proxy.subscriber_queue == 0 {
        return Err(ContractError::config_validation(
            "proxy.subscriber_queue",
            "subscriber_queue must be > 0",
        ));
    }
    if proxy.keepalive_secs == 0 || proxy.keepalive_secs > MAX_KEEPALIVE_SECS {
        return Err(ContractError::config_validation(
            "proxy.keepalive_secs",
            format!(
                "keepalive_secs must be in 1..={MAX_KEEPALIVE_SECS}, got {}",
                proxy.keepalive_secs
            ),
        ));
    }
    if proxy.accept_retry_ms == 0 {
        return Err(ContractError::config_validation(
            "proxy.accept_retry_ms",
            "accept_retry_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验 Prometheus 监听地址
fn validate_metrics(blueprint: &ProxyBlueprint) -> Result<(), ContractError> {
    if let Some(metrics) = &blueprint.metrics {
        if metrics.listen.parse::<SocketAddr>().is_err() {
            return Err(ContractError::config_validation(
                "metrics.listen",
                format!("'{}' is not a socket address (ip:port)", metrics.listen),
            ));
        }
    }
    Ok(())
}
