// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Static maps from protocol codes and addon ids to worker modules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a managed worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppCategory {
    Interface,
    Addon,
}

impl AppCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            AppCategory::Interface => "interface",
            AppCategory::Addon => "addon",
        }
    }
}

impl fmt::Display for AppCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interface" => Ok(AppCategory::Interface),
            "addon" => Ok(AppCategory::Addon),
            other => Err(format!("unknown app category: {other}")),
        }
    }
}

/// Worker module for a three-letter protocol code.
pub fn protocol_module(code: &str) -> Option<&'static str> {
    let module = match code {
        "mtc" => "nodi_edge_intf.modbus_tcp_client",
        "mts" => "nodi_edge_intf.modbus_tcp_server",
        "mvc" => "nodi_edge_intf.modbus_rtu_tcp_client",
        "mvs" => "nodi_edge_intf.modbus_rtu_tcp_server",
        "mrc" => "nodi_edge_intf.modbus_rtu_client",
        "mrs" => "nodi_edge_intf.modbus_rtu_server",
        "ouc" => "nodi_edge_intf.opcua_client",
        "ous" => "nodi_edge_intf.opcua_server",
        "mqc" => "nodi_edge_intf.mqtt_client",
        "mqs" => "nodi_edge_intf.mqtt_broker",
        "kfc" => "nodi_edge_intf.kafka_client",
        "kfs" => "nodi_edge_intf.kafka_server",
        "rdc" => "nodi_edge_intf.rdb_client",
        "rac" => "nodi_edge_intf.rest_client",
        "ras" => "nodi_edge_intf.rest_server",
        _ => return None,
    };
    Some(module)
}

/// Statically known addon workers: (app id, module).
pub const ADDON_MODULES: &[(&str, &str)] = &[
    ("vplc", "nodi_edge_addon.virtual_plc"),
    ("snf", "nodi_edge_addon.store_forward"),
];

/// Module for a known addon id.
pub fn addon_module(app_id: &str) -> Option<&'static str> {
    ADDON_MODULES
        .iter()
        .find(|(id, _)| *id == app_id)
        .map(|(_, module)| *module)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
