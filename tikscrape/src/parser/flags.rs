//! Section-specific flag alphabets.
//!
//! Every RouterOS menu prints its own `Flags:` legend, so the same letter
//! means different things depending on where it came from (`D` is
//! "dynamic" everywhere, but `C` is "connect" for routes and "complete" for
//! ARP entries).

use std::fmt;

use indexmap::IndexMap;

/// Known RouterOS menus that carry a flag alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Route,
    InterfaceList,
    Interface,
    Arp,
    DhcpLease,
    SimpleQueue,
}

/// Match order matters: `interface list` must be tried before `interface`.
const SECTION_NEEDLES: &[(Section, &[&str])] = &[
    (Section::Route, &["ip route", "route"]),
    (Section::InterfaceList, &["interface list", "interface-list"]),
    (Section::Interface, &["interface"]),
    (Section::Arp, &["arp"]),
    (
        Section::DhcpLease,
        &["dhcp-server lease", "dhcp-lease", "dhcp lease"],
    ),
    (Section::SimpleQueue, &["queue simple", "simple queue"]),
];

const ROUTE_FLAGS: &[(char, &str)] = &[
    ('X', "disabled"),
    ('A', "active"),
    ('D', "dynamic"),
    ('C', "connect"),
    ('S', "static"),
    ('r', "rip"),
    ('b', "bgp"),
    ('o', "ospf"),
    ('m', "mme"),
    ('B', "blackhole"),
    ('U', "unreachable"),
    ('P', "prohibit"),
];

const INTERFACE_FLAGS: &[(char, &str)] = &[
    ('D', "dynamic"),
    ('X', "disabled"),
    ('R', "running"),
    ('S', "slave"),
];

const INTERFACE_LIST_FLAGS: &[(char, &str)] = &[('*', "builtin"), ('D', "dynamic")];

const ARP_FLAGS: &[(char, &str)] = &[
    ('X', "disabled"),
    ('I', "invalid"),
    ('H', "dhcp"),
    ('D', "dynamic"),
    ('P', "published"),
    ('C', "complete"),
];

const DHCP_LEASE_FLAGS: &[(char, &str)] = &[
    ('X', "disabled"),
    ('R', "radius"),
    ('D', "dynamic"),
    ('B', "blocked"),
];

const SIMPLE_QUEUE_FLAGS: &[(char, &str)] = &[('X', "disabled"), ('I', "invalid"), ('D', "dynamic")];

impl Section {
    /// Resolve a free-form section name (`"IP Route"`, `"/ip route print
    /// detail"`, `"dhcp-lease"`) to a known section.
    pub fn from_name(name: &str) -> Option<Self> {
        let lowered = name.to_lowercase();
        SECTION_NEEDLES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lowered.contains(n)))
            .map(|(section, _)| *section)
    }

    /// Canonical menu path.
    pub fn canonical(&self) -> &'static str {
        match self {
            Section::Route => "/ip route",
            Section::InterfaceList => "/interface list",
            Section::Interface => "/interface",
            Section::Arp => "/ip arp",
            Section::DhcpLease => "/ip dhcp-server lease",
            Section::SimpleQueue => "/queue simple",
        }
    }

    fn alphabet(&self) -> &'static [(char, &'static str)] {
        match self {
            Section::Route => ROUTE_FLAGS,
            Section::InterfaceList => INTERFACE_LIST_FLAGS,
            Section::Interface => INTERFACE_FLAGS,
            Section::Arp => ARP_FLAGS,
            Section::DhcpLease => DHCP_LEASE_FLAGS,
            Section::SimpleQueue => SIMPLE_QUEUE_FLAGS,
        }
    }

    /// Semantic name for one flag character, if this section knows it.
    pub fn flag_name(&self, flag: char) -> Option<&'static str> {
        self.alphabet()
            .iter()
            .find(|(c, _)| *c == flag)
            .map(|(_, name)| *name)
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Decode a raw flag string for the named section.
///
/// Every character yields one `true` entry: its semantic name when the
/// section's alphabet knows it, the literal character otherwise. Unknown
/// sections therefore decode every flag literally.
pub fn decode(flags: &str, section: &str) -> IndexMap<String, bool> {
    decode_for(flags, Section::from_name(section))
}

/// [`decode`] with an already resolved section.
pub fn decode_for(flags: &str, section: Option<Section>) -> IndexMap<String, bool> {
    flags
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| {
            let name = section
                .and_then(|s| s.flag_name(c))
                .map(str::to_string)
                .unwrap_or_else(|| c.to_string());
            (name, true)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_from_name_variants() {
        assert_eq!(Section::from_name("IP Route"), Some(Section::Route));
        assert_eq!(Section::from_name("/ip route"), Some(Section::Route));
        assert_eq!(
            Section::from_name("/ip route print detail without-paging"),
            Some(Section::Route)
        );
        assert_eq!(Section::from_name("/interface list"), Some(Section::InterfaceList));
        assert_eq!(Section::from_name("interface-list"), Some(Section::InterfaceList));
        assert_eq!(Section::from_name("/interface"), Some(Section::Interface));
        assert_eq!(Section::from_name("/ip arp"), Some(Section::Arp));
        assert_eq!(Section::from_name("ip dhcp-server lease"), Some(Section::DhcpLease));
        assert_eq!(Section::from_name("dhcp-lease"), Some(Section::DhcpLease));
        assert_eq!(Section::from_name("/queue simple"), Some(Section::SimpleQueue));
        assert_eq!(Section::from_name("/system identity"), None);
    }

    #[test]
    fn test_decode_known_flags() {
        let decoded = decode("XD", "/ip dhcp-server lease");
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get("disabled"), Some(&true));
        assert_eq!(decoded.get("dynamic"), Some(&true));
    }

    #[test]
    fn test_same_letter_differs_per_section() {
        assert!(decode("C", "/ip route").contains_key("connect"));
        assert!(decode("C", "/ip arp").contains_key("complete"));
        assert!(decode("S", "/interface").contains_key("slave"));
        assert!(decode("S", "/ip route").contains_key("static"));
    }

    #[test]
    fn test_unknown_flags_kept_literally() {
        let decoded = decode("DAZ", "/ip route");
        assert_eq!(decoded.get("dynamic"), Some(&true));
        assert_eq!(decoded.get("active"), Some(&true));
        assert_eq!(decoded.get("Z"), Some(&true));

        let decoded = decode("XY", "/system identity");
        assert_eq!(decoded.get("X"), Some(&true));
        assert_eq!(decoded.get("Y"), Some(&true));
    }

    #[test]
    fn test_every_character_decodes_once() {
        for (flags, section) in [("XADCS", "/ip route"), ("HDC", "/ip arp"), ("Qq", "/ip arp")] {
            let decoded = decode(flags, section);
            assert_eq!(decoded.len(), flags.chars().count());
            assert!(decoded.values().all(|v| *v));
            assert_eq!(decode(flags, section), decoded);
        }
    }

    #[test]
    fn test_empty_flags() {
        assert!(decode("", "/ip route").is_empty());
    }

    #[test]
    fn test_interface_list_builtin() {
        assert!(decode("*", "/interface list").contains_key("builtin"));
    }
}
