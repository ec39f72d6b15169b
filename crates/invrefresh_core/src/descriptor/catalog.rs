//! Default descriptors of an infrastructure manager.

use super::{
    DefaultAttribute, Descriptor, Discriminator, KeyAttribute, Registry, SaveStrategy,
    ScopeDefinition, SelfReference,
};
use crate::error::CoreResult;
use invrefresh_storage::JoinHop;

const HARDWARE_ATTRIBUTES: &[&str] = &[
    "annotation",
    "cpu_cores_per_socket",
    "cpu_sockets",
    "cpu_speed",
    "cpu_total_cores",
    "cpu_type",
    "guest_os",
    "manufacturer",
    "memory_mb",
    "model",
    "networks",
    "number_of_nics",
    "serial_number",
];

const OPERATING_SYSTEM_ATTRIBUTES: &[&str] =
    &["name", "product_name", "product_type", "system_type", "version"];

fn vm_scope() -> ScopeDefinition {
    ScopeDefinition::new(vec![JoinHop::new("vm_or_template_id", "vms")], "ems_ref")
}

fn owned(descriptor: Descriptor) -> Descriptor {
    descriptor.with_default("ems_id", DefaultAttribute::ManagerId)
}

fn vms() -> Descriptor {
    owned(Descriptor::new("vms", "vms", vec![KeyAttribute::scalar("ems_ref")]))
        .with_attributes(&[
            "type",
            "cpu_limit",
            "cpu_reserve",
            "cpu_reserve_expand",
            "cpu_shares",
            "cpu_shares_level",
            "ems_ref",
            "ems_ref_obj",
            "uid_ems",
            "connection_state",
            "vendor",
            "name",
            "location",
            "template",
            "memory_limit",
            "memory_reserve",
            "memory_reserve_expand",
            "memory_shares",
            "memory_shares_level",
            "raw_power_state",
            "boot_time",
            "host",
            "ems_cluster",
            "storages",
            "storage",
            "snapshots",
        ])
        .with_blacklist(&["genealogy_parent"])
        .with_default("name", DefaultAttribute::constant("unknown"))
        .with_default("location", DefaultAttribute::constant("unknown"))
        .with_default("template", DefaultAttribute::constant(false))
        .with_discriminator(Discriminator::new("template", false))
        .with_save_strategy(SaveStrategy::Default)
        .reconnectable()
}

fn miq_templates() -> Descriptor {
    owned(Descriptor::new(
        "miq_templates",
        "vms",
        vec![KeyAttribute::scalar("ems_ref")],
    ))
    .with_attributes(&[
        "type",
        "ems_ref",
        "ems_ref_obj",
        "uid_ems",
        "connection_state",
        "vendor",
        "name",
        "location",
        "template",
        "memory_limit",
        "memory_reserve",
        "raw_power_state",
        "boot_time",
        "host",
        "ems_cluster",
        "storages",
        "storage",
        "snapshots",
    ])
    .with_blacklist(&["genealogy_parent"])
    .with_default("name", DefaultAttribute::constant("unknown"))
    .with_default("location", DefaultAttribute::constant("unknown"))
    .with_default("template", DefaultAttribute::constant(true))
    .with_discriminator(Discriminator::new("template", true))
    .reconnectable()
}

fn hardwares() -> Descriptor {
    Descriptor::new(
        "hardwares",
        "hardwares",
        vec![KeyAttribute::reference("vm_or_template", "vms")],
    )
    .with_parents(&["vms", "miq_templates"])
    .with_attributes(&[HARDWARE_ATTRIBUTES, &["virtual_hw_version"][..]].concat())
    .with_scope(vm_scope())
}

fn host_hardwares() -> Descriptor {
    Descriptor::new(
        "host_hardwares",
        "hardwares",
        vec![KeyAttribute::reference("host", "hosts")],
    )
    .with_attributes(HARDWARE_ATTRIBUTES)
}

fn operating_systems() -> Descriptor {
    Descriptor::new(
        "operating_systems",
        "operating_systems",
        vec![KeyAttribute::reference("vm_or_template", "vms")],
    )
    .with_parents(&["vms", "miq_templates"])
    .with_attributes(OPERATING_SYSTEM_ATTRIBUTES)
    .with_scope(vm_scope())
}

fn host_operating_systems() -> Descriptor {
    Descriptor::new(
        "host_operating_systems",
        "operating_systems",
        vec![KeyAttribute::reference("host", "hosts")],
    )
    .with_attributes(OPERATING_SYSTEM_ATTRIBUTES)
}

fn disks() -> Descriptor {
    Descriptor::new(
        "disks",
        "disks",
        vec![
            KeyAttribute::reference("hardware", "hardwares"),
            KeyAttribute::scalar("device_name"),
        ],
    )
    .with_parents(&["vms"])
    .with_attributes(&[
        "device_name",
        "device_type",
        "controller_type",
        "present",
        "filename",
        "location",
        "size",
        "size_on_disk",
        "disk_type",
        "mode",
        "bootable",
        "storage",
    ])
    .with_scope(ScopeDefinition::new(
        vec![
            JoinHop::new("hardware_id", "hardwares"),
            JoinHop::new("vm_or_template_id", "vms"),
        ],
        "ems_ref",
    ))
}

fn networks() -> Descriptor {
    Descriptor::new(
        "networks",
        "networks",
        vec![
            KeyAttribute::reference("hardware", "hardwares"),
            KeyAttribute::scalar("ipaddress"),
            KeyAttribute::scalar("ipv6address"),
        ],
    )
    .with_attributes(&["description", "hostname", "ipaddress", "subnet_mask", "ipv6address"])
}

fn host_networks() -> Descriptor {
    Descriptor::new(
        "host_networks",
        "networks",
        vec![
            KeyAttribute::reference("hardware", "host_hardwares"),
            KeyAttribute::scalar("ipaddress"),
        ],
    )
    .with_attributes(&["description", "hostname", "ipaddress", "subnet_mask"])
}

fn guest_devices() -> Descriptor {
    Descriptor::new(
        "guest_devices",
        "guest_devices",
        vec![
            KeyAttribute::reference("hardware", "hardwares"),
            KeyAttribute::scalar("uid_ems"),
        ],
    )
    .with_attributes(&[
        "address",
        "controller_type",
        "device_name",
        "device_type",
        "lan",
        "location",
        "network",
        "present",
        "switch",
        "uid_ems",
    ])
}

fn snapshots() -> Descriptor {
    Descriptor::new("snapshots", "snapshots", vec![KeyAttribute::scalar("uid")])
        .with_attributes(&[
            "uid_ems",
            "uid",
            "parent_uid",
            "name",
            "description",
            "create_time",
            "current",
            "vm_or_template",
        ])
        .with_self_reference(SelfReference::new("parent_uid", "uid", "parent_id"))
}

fn custom_attributes() -> Descriptor {
    Descriptor::new(
        "custom_attributes",
        "custom_attributes",
        vec![KeyAttribute::scalar("name")],
    )
    .with_attributes(&["section", "name", "value", "source"])
}

fn ems_folders() -> Descriptor {
    owned(Descriptor::new(
        "ems_folders",
        "ems_folders",
        vec![KeyAttribute::scalar("uid_ems")],
    ))
    .with_attributes(&["ems_ref", "name", "type", "uid_ems", "hidden"])
    .with_blacklist(&["ems_children"])
}

fn datacenters() -> Descriptor {
    owned(Descriptor::new(
        "datacenters",
        "ems_folders",
        vec![KeyAttribute::scalar("ems_ref")],
    ))
    .with_attributes(&["name", "type", "uid_ems", "ems_ref", "ems_ref_obj", "hidden"])
}

fn resource_pools() -> Descriptor {
    owned(Descriptor::new(
        "resource_pools",
        "resource_pools",
        vec![KeyAttribute::scalar("uid_ems")],
    ))
    .with_attributes(&["ems_ref", "name", "uid_ems", "is_default"])
    .with_blacklist(&["ems_children"])
}

fn ems_clusters() -> Descriptor {
    owned(Descriptor::new(
        "ems_clusters",
        "ems_clusters",
        vec![KeyAttribute::scalar("ems_ref")],
    ))
    .with_attributes(&["ems_ref", "ems_ref_obj", "uid_ems", "name", "datacenter_id"])
    .with_blacklist(&["ems_children", "datacenter_id"])
}

fn storages() -> Descriptor {
    Descriptor::new("storages", "storages", vec![KeyAttribute::scalar("location")]).with_attributes(&[
        "ems_ref",
        "ems_ref_obj",
        "name",
        "store_type",
        "storage_domain_type",
        "total_space",
        "free_space",
        "uncommitted",
        "multiplehostaccess",
        "location",
        "master",
    ])
}

fn hosts() -> Descriptor {
    owned(Descriptor::new("hosts", "hosts", vec![KeyAttribute::scalar("ems_ref")]))
        .with_attributes(&[
            "type",
            "ems_ref",
            "ems_ref_obj",
            "name",
            "hostname",
            "ipaddress",
            "uid_ems",
            "vmm_vendor",
            "vmm_product",
            "vmm_version",
            "vmm_buildnumber",
            "connection_state",
            "power_state",
            "ems_cluster",
            "ipmi_address",
            "maintenance",
        ])
        .reconnectable()
}

fn host_storages() -> Descriptor {
    Descriptor::new(
        "host_storages",
        "host_storages",
        vec![
            KeyAttribute::reference("host", "hosts"),
            KeyAttribute::reference("storage", "storages"),
        ],
    )
    .with_attributes(&["ems_ref", "read_only", "host", "storage"])
}

fn host_switches() -> Descriptor {
    Descriptor::new(
        "host_switches",
        "host_switches",
        vec![
            KeyAttribute::reference("host", "hosts"),
            KeyAttribute::reference("switch", "switches"),
        ],
    )
    .with_attributes(&["host", "switch"])
}

fn switches() -> Descriptor {
    Descriptor::new("switches", "switches", vec![KeyAttribute::scalar("uid_ems")])
        .with_attributes(&["uid_ems", "name", "lans"])
}

fn lans() -> Descriptor {
    Descriptor::new("lans", "lans", vec![KeyAttribute::scalar("uid_ems")])
        .with_attributes(&["name", "uid_ems", "tag"])
}

/// Builds the registry of an infrastructure manager's collections.
///
/// # Errors
///
/// Returns an error only if a built-in descriptor fails validation.
pub fn infra_registry() -> CoreResult<Registry> {
    let mut registry = Registry::new();
    for descriptor in [
        vms(),
        miq_templates(),
        hardwares(),
        host_hardwares(),
        operating_systems(),
        host_operating_systems(),
        disks(),
        networks(),
        host_networks(),
        guest_devices(),
        snapshots(),
        custom_attributes(),
        ems_folders(),
        datacenters(),
        resource_pools(),
        ems_clusters(),
        storages(),
        hosts(),
        host_storages(),
        host_switches(),
        switches(),
        lans(),
    ] {
        registry.register(descriptor)?;
    }
    Ok(registry)
}
