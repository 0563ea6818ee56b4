//! Naming rules for generated port groups

use crate::types::VlanMode;

/// Prefix of every port group created by the connector
pub const PORT_GROUP_PREFIX: &str = "QS";

/// Inventory path separator
pub const PATH_DELIMITER: char = '/';

/// Build the name of the port group carrying `vlan_id` on `switch_name`
///
/// The VLAN id is always surrounded by underscores, which is what
/// [`vlan_marker`] relies on to recognise it again.
pub fn generate_port_group_name(switch_name: &str, vlan_id: &str, mode: VlanMode) -> String {
    format!(
        "{}_{}_VLAN_{}_{}",
        PORT_GROUP_PREFIX,
        switch_name,
        vlan_id.trim(),
        mode.as_str()
    )
}

/// Marker identifying `vlan_id` inside a generated port group name
pub fn vlan_marker(vlan_id: &str) -> String {
    format!("_{}_", vlan_id.trim())
}

/// Split `"folder/sub/name"` into `("folder/sub", "name")`
pub fn split_full_name(full_name: &str) -> (&str, &str) {
    match full_name.rsplit_once(PATH_DELIMITER) {
        Some((location, name)) => (location, name),
        None => ("", full_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_port_group_name() {
        assert_eq!(
            generate_port_group_name("dvSwitch", "7", VlanMode::Access),
            "QS_dvSwitch_VLAN_7_Access"
        );
        assert_eq!(
            generate_port_group_name("dvSwitch", "10-20", VlanMode::Trunk),
            "QS_dvSwitch_VLAN_10-20_Trunk"
        );
    }

    #[test]
    fn test_vlan_marker_matches_generated_name() {
        let name = generate_port_group_name("dvSwitch", "7", VlanMode::Access);
        assert!(name.contains(&vlan_marker("7")));
        assert!(!name.contains(&vlan_marker("70")));
    }

    #[test]
    fn test_split_full_name() {
        assert_eq!(split_full_name("QualiSB/Anetwork"), ("QualiSB", "Anetwork"));
        assert_eq!(split_full_name("DC/net/VM Network"), ("DC/net", "VM Network"));
        assert_eq!(split_full_name("Anetwork"), ("", "Anetwork"));
    }
}
