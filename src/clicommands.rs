/// External crates for the inventory application
use std::collections::BTreeSet;

use tracing::{error, info, warn};

use crate::campus::CampusTextStore;
use crate::cliconfig::{SessionContext, StorageKind};
use crate::connectivity::ping_assignment;
use crate::console::Console;
use crate::device::{check_services, Device, DeviceKind, DeviceType, IpAssignment, Layer, Service};
use crate::errors::{InventoryError, ValidationError};
use crate::execute::{ask, ask_until, choose, confirm, FlowBreak, MenuCommand, MenuRegistry};
use crate::navigation::{NavCommand, Screen};
use crate::report::{export_report, render_devices, summary_line, ReportKind, Statistics};
use crate::store::DeviceStore;
use crate::validation::{validate_ip, validate_name, validate_services, validate_vlans};

/// Builds the menu commands of every screen.
pub fn build_menu_registry() -> MenuRegistry {
    let mut registry = MenuRegistry::default();

    registry.insert(
        Screen::Main,
        vec![
            MenuCommand { key: "1", description: "Devices", execute: |ctx, _| enter(ctx, Screen::Devices) },
            MenuCommand { key: "2", description: "Campuses", execute: |ctx, _| enter(ctx, Screen::Campuses) },
            MenuCommand { key: "3", description: "Reports", execute: |ctx, _| enter(ctx, Screen::Reports) },
            MenuCommand { key: "4", description: "Connectivity check", execute: |ctx, _| enter(ctx, Screen::Connectivity) },
            MenuCommand { key: "5", description: "Quit", execute: |_, _| Err(FlowBreak::Nav(NavCommand::Quit)) },
        ],
    );

    registry.insert(
        Screen::Devices,
        vec![
            MenuCommand { key: "1", description: "List devices", execute: list_devices },
            MenuCommand { key: "2", description: "Add device", execute: add_device },
            MenuCommand { key: "3", description: "Search devices by name", execute: search_devices },
            MenuCommand { key: "4", description: "Add services to a device", execute: add_service },
            MenuCommand { key: "5", description: "Delete device", execute: delete_device },
        ],
    );

    registry.insert(
        Screen::SearchResults,
        vec![
            MenuCommand { key: "1", description: "Ping a result", execute: ping_search_result },
            MenuCommand { key: "2", description: "Delete a result", execute: delete_search_result },
            MenuCommand { key: "3", description: "New search", execute: search_devices },
        ],
    );

    registry.insert(
        Screen::Campuses,
        vec![
            MenuCommand { key: "1", description: "List campuses", execute: list_campuses },
            MenuCommand { key: "2", description: "Select active campus", execute: select_campus },
        ],
    );

    registry.insert(
        Screen::Reports,
        vec![
            MenuCommand { key: "1", description: "Show statistics", execute: show_statistics },
            MenuCommand {
                key: "2",
                description: "Export statistics report",
                execute: |ctx, console| export(ctx, console, ReportKind::Statistics),
            },
            MenuCommand {
                key: "3",
                description: "Export device list",
                execute: |ctx, console| export(ctx, console, ReportKind::DeviceList),
            },
        ],
    );

    registry.insert(
        Screen::Connectivity,
        vec![
            MenuCommand { key: "1", description: "Ping a device", execute: ping_device },
            MenuCommand { key: "2", description: "Ping every device with an address", execute: ping_all },
        ],
    );

    registry
}

/// Extra lines shown above a screen's options.
pub fn screen_header(screen: Screen, context: &SessionContext) -> Option<String> {
    match screen {
        Screen::Main => Some(format!(
            "{} device(s) registered{}",
            context.inventory.len(),
            context
                .campus
                .as_ref()
                .map(|c| format!(" | campus: {}", c))
                .unwrap_or_default()
        )),
        Screen::Campuses => Some(format!(
            "Active campus: {}",
            context.campus.as_deref().unwrap_or("none")
        )),
        Screen::SearchResults => {
            let query = context.last_search.as_deref().unwrap_or_default();
            let hits = context.inventory.search(query);
            let mut out = format!("Results for '{}': {} match(es)\n", query, hits.len());
            for &i in &hits {
                if let Some(device) = context.inventory.get(i) {
                    out.push_str(&summary_line(i + 1, device));
                    out.push('\n');
                }
            }
            Some(out.trim_end().to_string())
        }
        Screen::Devices | Screen::Reports | Screen::Connectivity => None,
    }
}

fn enter(context: &mut SessionContext, screen: Screen) -> Result<(), FlowBreak> {
    context.navigator.enter(screen);
    Ok(())
}

fn persist_added(context: &SessionContext, console: &mut dyn Console, index: usize) {
    let Some(device) = context.inventory.get(index) else {
        return;
    };
    match context.store.record_added(context.inventory.devices(), device) {
        Ok(()) => console.say(&format!("Saved to {}.", context.store.describe())),
        Err(e) => {
            error!(error = %e, "saving new device failed");
            console.say(&format!("Warning: could not save ({}). The change is kept for this session.", e));
        }
    }
}

fn persist_changed(context: &SessionContext, console: &mut dyn Console) {
    match context.store.record_changed(context.inventory.devices()) {
        Ok(()) => console.say(&format!("Saved to {}.", context.store.describe())),
        Err(e) => {
            error!(error = %e, "saving inventory failed");
            console.say(&format!("Warning: could not save ({}). The change is kept for this session.", e));
        }
    }
}

/// In text storage the campus decides the file, so one must be active
/// before anything is written.
fn require_campus(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    if context.config.storage == StorageKind::Text && context.campus.is_none() {
        console.say("Select the campus to work on first.");
        select_campus(context, console)?;
    }
    Ok(())
}

/// Picks one device among `indices`; returns its inventory index.
fn pick_device(
    context: &SessionContext,
    console: &mut dyn Console,
    indices: &[usize],
    prompt: &str,
) -> Result<usize, FlowBreak> {
    let labels: Vec<String> = indices
        .iter()
        .filter_map(|&i| context.inventory.get(i).map(|d| d.name.clone()))
        .collect();
    let picked = choose(console, prompt, &labels)?;
    indices.get(picked).copied().ok_or(FlowBreak::Cancelled)
}

fn list_devices(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let all: Vec<usize> = (0..context.inventory.len()).collect();
    console.say(&render_devices(context.inventory.devices(), &all));
    Ok(())
}

fn ask_device_type(console: &mut dyn Console) -> Result<DeviceType, FlowBreak> {
    console.say("Device type:");
    let types = DeviceType::all();
    let labels: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    let picked = choose(console, "Type (empty to cancel): ", &labels)?;
    types.get(picked).copied().ok_or(FlowBreak::Cancelled)
}

fn ask_layer(console: &mut dyn Console) -> Result<Layer, FlowBreak> {
    console.say("Hierarchy layer:");
    let layers = Layer::all();
    let labels: Vec<String> = layers.iter().map(|l| l.to_string()).collect();
    loop {
        match choose(console, "Layer: ", &labels) {
            Ok(picked) => return layers.get(picked).copied().ok_or(FlowBreak::Cancelled),
            Err(FlowBreak::Cancelled) => console.say("  A layer is required for this device type."),
            Err(other) => return Err(other),
        }
    }
}

/// Parses `1,3` or `DNS, HTTP` against the services allowed for `device_type`.
pub fn parse_service_answer(device_type: DeviceType, answer: &str) -> Result<BTreeSet<Service>, InventoryError> {
    let allowed = device_type.allowed_services();
    let mut names = Vec::new();
    for token in answer.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<usize>() {
            Ok(n) if (1..=allowed.len()).contains(&n) => names.push(allowed[n - 1].to_string()),
            Ok(_) => {
                return Err(InventoryError::Validation(
                    ValidationError::UnknownService(token.to_string()),
                ))
            }
            Err(_) => names.push(token.to_string()),
        }
    }
    let services = validate_services(&names)?;
    check_services(device_type, &services)?;
    Ok(services)
}

fn show_allowed_services(console: &mut dyn Console, device_type: DeviceType) {
    console.say(&format!("Services available for {}:", device_type));
    for (i, service) in device_type.allowed_services().iter().enumerate() {
        console.say(&format!("  {}. {}", i + 1, service));
    }
    console.set_choices(device_type.allowed_services().iter().map(|s| s.to_string()).collect());
}

fn ask_vlans(console: &mut dyn Console) -> Result<Vec<u16>, FlowBreak> {
    let parsed = ask_until(console, "VLANs (comma separated, empty to skip): ", validate_vlans)?;
    for dup in &parsed.duplicates {
        warn!(vlan = dup, "duplicate VLAN ignored");
        console.say(&format!("  Warning: VLAN {} was listed more than once, duplicate ignored.", dup));
    }
    Ok(parsed.vlans)
}

fn add_device(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    require_campus(context, console)?;
    console.say("New device. Type 'cancel' at any prompt to abort.");

    let device_type = ask_device_type(console)?;

    let name = ask_until(console, "Name: ", |answer| -> Result<String, InventoryError> {
        let name = validate_name(answer)?;
        context.inventory.check_name_free(&name)?;
        Ok(name)
    })?;

    let ip_prompt = format!("IP address ({}): ", device_type.ip_hint());
    let ip = ask_until(console, &ip_prompt, |answer| -> Result<IpAssignment, InventoryError> {
        let ip = validate_ip(answer)?;
        if !device_type.accepts_ip(&ip) {
            return Err(InventoryError::IpNotAllowed {
                kind: device_type.to_string(),
                ip: ip.to_string(),
            });
        }
        context.inventory.check_ip_free(&ip)?;
        Ok(ip)
    })?;

    let layer = if device_type.carries_layer() {
        Some(ask_layer(console)?)
    } else {
        None
    };

    let services = if device_type.carries_services() {
        show_allowed_services(console, device_type);
        let picked = ask_until(console, "Services (numbers or names, comma separated, empty for none): ", |answer| {
            parse_service_answer(device_type, answer)
        });
        console.set_choices(Vec::new());
        picked?
    } else {
        BTreeSet::new()
    };

    let vlans = ask_vlans(console)?;

    let kind = match DeviceKind::build(device_type, ip, layer, services) {
        Ok(kind) => kind,
        Err(e) => {
            console.say(&format!("Device not added: {}", e));
            return Ok(());
        }
    };
    let device = Device::new(name, kind, vlans);
    match context.inventory.add(device) {
        Ok(index) => {
            info!(device = %context.inventory.devices()[index].name, "device added");
            console.say(&format!("Device '{}' added.", context.inventory.devices()[index].name));
            persist_added(context, console, index);
        }
        Err(e) => console.say(&format!("Device not added: {}", e)),
    }
    Ok(())
}

fn search_devices(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let query = ask(console, "Search name (empty to cancel): ")?;
    if query.is_empty() {
        return Err(FlowBreak::Cancelled);
    }
    let hits = context.inventory.search(&query);
    if hits.is_empty() {
        console.say(&format!("No devices match '{}'.", query));
        return Ok(());
    }
    context.last_search = Some(query);
    context.navigator.enter(Screen::SearchResults);
    Ok(())
}

fn add_service(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let capable = context.inventory.service_capable();
    if capable.is_empty() {
        console.say("No Server, Router or Firewall devices are registered.");
        return Ok(());
    }
    console.say("Devices that accept services:");
    let index = pick_device(context, console, &capable, "Device (empty to cancel): ")?;
    let (device_type, current) = match context.inventory.get(index) {
        Some(device) => (device.device_type(), device.services_label()),
        None => return Err(FlowBreak::Cancelled),
    };
    console.say(&format!("Current services: {}", current));
    show_allowed_services(console, device_type);

    let picked = ask_until(console, "Services to add (empty to cancel): ", |answer| {
        if answer.is_empty() {
            return Ok(None);
        }
        parse_service_answer(device_type, answer).map(Some)
    });
    console.set_choices(Vec::new());
    let Some(services) = picked? else {
        return Err(FlowBreak::Cancelled);
    };

    match context.inventory.add_services(index, &services) {
        Ok(merge) => {
            for service in &merge.already_present {
                console.say(&format!("  Warning: {} is already configured, skipped.", service));
            }
            if merge.added.is_empty() {
                console.say("No new services added.");
            } else {
                let added: Vec<String> = merge.added.iter().map(|s| s.to_string()).collect();
                info!(device = index + 1, services = %added.join(","), "services added");
                console.say(&format!("Added: {}", added.join(", ")));
                persist_changed(context, console);
            }
        }
        Err(e) => console.say(&format!("Services not added: {}", e)),
    }
    Ok(())
}

fn confirm_and_delete(context: &mut SessionContext, console: &mut dyn Console, index: usize) -> Result<(), FlowBreak> {
    let Some(name) = context.inventory.get(index).map(|d| d.name.clone()) else {
        return Err(FlowBreak::Cancelled);
    };
    if !confirm(console, &format!("Delete '{}'? (y/n): ", name))? {
        console.say("Deletion cancelled.");
        return Ok(());
    }
    match context.inventory.delete(index) {
        Ok(removed) => {
            info!(device = %removed.name, "device deleted");
            console.say(&format!("Device '{}' deleted.", removed.name));
            persist_changed(context, console);
        }
        Err(e) => console.say(&format!("Nothing deleted: {}", e)),
    }
    Ok(())
}

fn delete_device(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    require_campus(context, console)?;
    if context.inventory.is_empty() {
        console.say("No devices registered.");
        return Ok(());
    }
    let all: Vec<usize> = (0..context.inventory.len()).collect();
    let index = pick_device(context, console, &all, "Device to delete (empty to cancel): ")?;
    confirm_and_delete(context, console, index)
}

fn current_results(context: &SessionContext) -> Vec<usize> {
    context
        .last_search
        .as_deref()
        .map(|q| context.inventory.search(q))
        .unwrap_or_default()
}

fn delete_search_result(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let hits = current_results(context);
    if hits.is_empty() {
        console.say("No results to delete.");
        return Ok(());
    }
    let index = pick_device(context, console, &hits, "Device to delete (empty to cancel): ")?;
    confirm_and_delete(context, console, index)
}

fn ping_and_report(context: &SessionContext, console: &mut dyn Console, index: usize) {
    let Some(device) = context.inventory.get(index) else {
        return;
    };
    let ip = device.ip();
    if ip.address().is_some() {
        console.say(&format!("Pinging {} ({})...", device.name, ip));
    }
    let outcome = ping_assignment(context.pinger.as_ref(), &ip);
    console.say(&format!("{}: {}", device.name, outcome.describe()));
}

fn ping_search_result(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let hits = current_results(context);
    if hits.is_empty() {
        console.say("No results to ping.");
        return Ok(());
    }
    let index = pick_device(context, console, &hits, "Device to ping (empty to cancel): ")?;
    ping_and_report(context, console, index);
    Ok(())
}

fn ping_device(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    if context.inventory.is_empty() {
        console.say("No devices registered.");
        return Ok(());
    }
    let all: Vec<usize> = (0..context.inventory.len()).collect();
    let index = pick_device(context, console, &all, "Device to ping (empty to cancel): ")?;
    ping_and_report(context, console, index);
    Ok(())
}

fn ping_all(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let targets: Vec<usize> = context
        .inventory
        .devices()
        .iter()
        .enumerate()
        .filter(|(_, d)| d.ip().address().is_some())
        .map(|(i, _)| i)
        .collect();
    if targets.is_empty() {
        console.say("No devices with an IP address.");
        return Ok(());
    }
    let mut reachable = 0;
    for &index in &targets {
        let Some(device) = context.inventory.get(index) else {
            continue;
        };
        let outcome = ping_assignment(context.pinger.as_ref(), &device.ip());
        if outcome.is_success() {
            reachable += 1;
        }
        console.say(&format!("  {:<24} {:<15} {}", device.name, device.ip(), outcome.describe()));
    }
    console.say(&format!("{} of {} device(s) answered.", reachable, targets.len()));
    Ok(())
}

fn list_campuses(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    console.say("Campuses:");
    for (i, campus) in context.config.campuses.iter().enumerate() {
        let marker = if context.campus.as_deref() == Some(campus.as_str()) { " (active)" } else { "" };
        let count = if context.config.storage == StorageKind::Text {
            let store = CampusTextStore::new(&context.config.campus_dir, campus.as_str());
            match store.load() {
                Ok(devices) => format!(" - {} device(s)", devices.len()),
                Err(_) => " - unreadable".to_string(),
            }
        } else {
            String::new()
        };
        console.say(&format!("  {}. {}{}{}", i + 1, campus, marker, count));
    }
    Ok(())
}

fn select_campus(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    let campuses = context.config.campuses.clone();
    if campuses.is_empty() {
        console.say("No campuses configured.");
        return Err(FlowBreak::Cancelled);
    }
    let picked = choose(console, "Campus (empty to cancel): ", &campuses)?;
    let Some(campus) = campuses.get(picked) else {
        return Err(FlowBreak::Cancelled);
    };
    if let Some(e) = context.select_campus(campus) {
        console.say(&format!("Warning: could not read the campus file ({}). Starting with an empty list.", e));
    }
    console.say(&format!("Active campus: {} ({} device(s))", campus, context.inventory.len()));
    Ok(())
}

fn show_statistics(context: &mut SessionContext, console: &mut dyn Console) -> Result<(), FlowBreak> {
    console.say(&Statistics::collect(context.inventory.devices()).render());
    Ok(())
}

fn export(context: &mut SessionContext, console: &mut dyn Console, kind: ReportKind) -> Result<(), FlowBreak> {
    match export_report(
        &context.config.reports_dir,
        kind,
        context.inventory.devices(),
        context.campus.as_deref(),
        context.user.as_deref(),
    ) {
        Ok(path) => console.say(&format!("Report written to {}", path.display())),
        Err(e) => {
            error!(error = %e, "report export failed");
            console.say(&format!("Could not write the report: {}", e));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_screen_has_commands() {
        let registry = build_menu_registry();
        for screen in [
            Screen::Main,
            Screen::Devices,
            Screen::SearchResults,
            Screen::Campuses,
            Screen::Reports,
            Screen::Connectivity,
        ] {
            assert!(!registry.commands(screen).is_empty(), "{screen} has no commands");
        }
        assert!(registry.find(Screen::Devices, "2").is_some());
        assert!(registry.find(Screen::Devices, "9").is_none());
    }

    #[test]
    fn service_answers_accept_numbers_and_names() {
        let services = parse_service_answer(DeviceType::Router, "1, nat").unwrap();
        assert_eq!(services.into_iter().collect::<Vec<_>>(), vec![Service::Routing, Service::Nat]);
        assert!(parse_service_answer(DeviceType::Router, "").unwrap().is_empty());
    }

    #[test]
    fn service_answers_reject_foreign_services() {
        assert!(matches!(
            parse_service_answer(DeviceType::Router, "HTTP"),
            Err(InventoryError::ServiceNotAllowed { .. })
        ));
        assert!(matches!(
            parse_service_answer(DeviceType::Router, "42"),
            Err(InventoryError::Validation(_))
        ));
        assert!(matches!(
            parse_service_answer(DeviceType::Server, "coffee"),
            Err(InventoryError::Validation(_))
        ));
    }
}
