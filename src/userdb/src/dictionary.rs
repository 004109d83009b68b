//! Attribute dictionary
//!
//! Maps attribute names used in rule files to numeric identifiers. Ids below
//! 256 are RADIUS wire attributes, 256..=65535 are server-local configuration
//! attributes, and anything above carries a vendor number in the high 16 bits.

use crate::types::AttributeId;

/// Well-known attribute identifiers
pub mod attr {
    use super::AttributeId;

    pub const USER_NAME: AttributeId = 1;
    pub const USER_PASSWORD: AttributeId = 2;
    pub const CHAP_PASSWORD: AttributeId = 3;
    pub const NAS_IP_ADDRESS: AttributeId = 4;
    pub const NAS_PORT: AttributeId = 5;
    pub const SERVICE_TYPE: AttributeId = 6;
    pub const FRAMED_PROTOCOL: AttributeId = 7;
    pub const FRAMED_IP_ADDRESS: AttributeId = 8;
    pub const FRAMED_IP_NETMASK: AttributeId = 9;
    pub const FRAMED_ROUTING: AttributeId = 10;
    pub const FILTER_ID: AttributeId = 11;
    pub const FRAMED_MTU: AttributeId = 12;
    pub const FRAMED_COMPRESSION: AttributeId = 13;
    pub const LOGIN_IP_HOST: AttributeId = 14;
    pub const LOGIN_SERVICE: AttributeId = 15;
    pub const REPLY_MESSAGE: AttributeId = 18;
    pub const CALLBACK_NUMBER: AttributeId = 19;
    pub const EXPIRATION: AttributeId = 21;
    pub const FRAMED_ROUTE: AttributeId = 22;
    pub const CLASS: AttributeId = 25;
    pub const VENDOR_SPECIFIC: AttributeId = 26;
    pub const SESSION_TIMEOUT: AttributeId = 27;
    pub const IDLE_TIMEOUT: AttributeId = 28;
    pub const CALLED_STATION_ID: AttributeId = 30;
    pub const CALLING_STATION_ID: AttributeId = 31;
    pub const NAS_IDENTIFIER: AttributeId = 32;
    pub const ACCT_STATUS_TYPE: AttributeId = 40;
    pub const ACCT_SESSION_ID: AttributeId = 44;
    pub const NAS_PORT_TYPE: AttributeId = 61;
    pub const PORT_LIMIT: AttributeId = 62;

    pub const FALL_THROUGH: AttributeId = 500;
    pub const ADD_PORT_TO_IP_ADDRESS: AttributeId = 501;
    pub const EXEC_PROGRAM: AttributeId = 502;
    pub const EXEC_PROGRAM_WAIT: AttributeId = 503;

    pub const AUTH_TYPE: AttributeId = 1000;
    pub const PREFIX: AttributeId = 1003;
    pub const SUFFIX: AttributeId = 1004;
    pub const GROUP: AttributeId = 1005;
    pub const CRYPT_PASSWORD: AttributeId = 1006;
    pub const GROUP_NAME: AttributeId = 1030;
    pub const HUNTGROUP_NAME: AttributeId = 1031;
    pub const SIMULTANEOUS_USE: AttributeId = 1034;
    pub const STRIP_USER_NAME: AttributeId = 1035;
    pub const HINT: AttributeId = 1040;
    pub const LOGIN_TIME: AttributeId = 1042;
    pub const CLEARTEXT_PASSWORD: AttributeId = 1100;

    pub const CISCO_AVPAIR: AttributeId = super::vendor_attribute(9, 1);
    pub const CISCO_NAS_PORT: AttributeId = super::vendor_attribute(9, 2);
    pub const ASCEND_DATA_FILTER: AttributeId = super::vendor_attribute(529, 242);
}

/// Encode a vendor-specific attribute id
pub const fn vendor_attribute(vendor: u32, attribute: u32) -> AttributeId {
    (vendor << 16) | (attribute & 0xffff)
}

/// Whether an attribute is a server-local configuration item, i.e. neither a
/// wire protocol attribute nor a vendor attribute.
pub fn is_local_attribute(id: AttributeId) -> bool {
    (id & !0xffff) == 0 && id >= 0x100
}

// Aliases come after the canonical name so reverse lookup prefers it.
const ATTRIBUTES: &[(&str, AttributeId)] = &[
    ("User-Name", attr::USER_NAME),
    ("User-Password", attr::USER_PASSWORD),
    ("Password", attr::USER_PASSWORD),
    ("CHAP-Password", attr::CHAP_PASSWORD),
    ("NAS-IP-Address", attr::NAS_IP_ADDRESS),
    ("NAS-Port", attr::NAS_PORT),
    ("NAS-Port-Id", attr::NAS_PORT),
    ("Service-Type", attr::SERVICE_TYPE),
    ("Framed-Protocol", attr::FRAMED_PROTOCOL),
    ("Framed-IP-Address", attr::FRAMED_IP_ADDRESS),
    ("Framed-IP-Netmask", attr::FRAMED_IP_NETMASK),
    ("Framed-Routing", attr::FRAMED_ROUTING),
    ("Filter-Id", attr::FILTER_ID),
    ("Framed-MTU", attr::FRAMED_MTU),
    ("Framed-Compression", attr::FRAMED_COMPRESSION),
    ("Login-IP-Host", attr::LOGIN_IP_HOST),
    ("Login-Service", attr::LOGIN_SERVICE),
    ("Reply-Message", attr::REPLY_MESSAGE),
    ("Callback-Number", attr::CALLBACK_NUMBER),
    ("Expiration", attr::EXPIRATION),
    ("Framed-Route", attr::FRAMED_ROUTE),
    ("Class", attr::CLASS),
    ("Vendor-Specific", attr::VENDOR_SPECIFIC),
    ("Session-Timeout", attr::SESSION_TIMEOUT),
    ("Idle-Timeout", attr::IDLE_TIMEOUT),
    ("Called-Station-Id", attr::CALLED_STATION_ID),
    ("Calling-Station-Id", attr::CALLING_STATION_ID),
    ("NAS-Identifier", attr::NAS_IDENTIFIER),
    ("Acct-Status-Type", attr::ACCT_STATUS_TYPE),
    ("Acct-Session-Id", attr::ACCT_SESSION_ID),
    ("NAS-Port-Type", attr::NAS_PORT_TYPE),
    ("Port-Limit", attr::PORT_LIMIT),
    ("Fall-Through", attr::FALL_THROUGH),
    ("Add-Port-To-IP-Address", attr::ADD_PORT_TO_IP_ADDRESS),
    ("Exec-Program", attr::EXEC_PROGRAM),
    ("Exec-Program-Wait", attr::EXEC_PROGRAM_WAIT),
    ("Auth-Type", attr::AUTH_TYPE),
    ("Prefix", attr::PREFIX),
    ("Suffix", attr::SUFFIX),
    ("Group", attr::GROUP),
    ("Crypt-Password", attr::CRYPT_PASSWORD),
    ("Group-Name", attr::GROUP_NAME),
    ("Huntgroup-Name", attr::HUNTGROUP_NAME),
    ("Simultaneous-Use", attr::SIMULTANEOUS_USE),
    ("Strip-User-Name", attr::STRIP_USER_NAME),
    ("Hint", attr::HINT),
    ("Login-Time", attr::LOGIN_TIME),
    ("Cleartext-Password", attr::CLEARTEXT_PASSWORD),
    ("Cisco-AVPair", attr::CISCO_AVPAIR),
    ("Cisco-NAS-Port", attr::CISCO_NAS_PORT),
    ("Ascend-Data-Filter", attr::ASCEND_DATA_FILTER),
];

/// Resolve an attribute name (case-insensitive) or an `Attr-<n>` literal.
pub fn attribute_id(name: &str) -> Option<AttributeId> {
    if let Some(id) = ATTRIBUTES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
    {
        return Some(id);
    }

    let digits = name.get(..5).filter(|p| p.eq_ignore_ascii_case("Attr-")).map(|_| &name[5..])?;
    digits.parse().ok()
}

/// Canonical name for an attribute id, falling back to `Attr-<n>`.
pub fn attribute_name(id: AttributeId) -> String {
    ATTRIBUTES
        .iter()
        .find(|(_, known)| *known == id)
        .map(|(name, _)| name.to_string())
        .unwrap_or_else(|| format!("Attr-{}", id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_names() {
        assert_eq!(attribute_id("User-Name"), Some(attr::USER_NAME));
        assert_eq!(attribute_id("fall-through"), Some(attr::FALL_THROUGH));
        assert_eq!(attribute_id("Cisco-AVPair"), Some((9 << 16) | 1));
        assert_eq!(attribute_id("No-Such-Attribute"), None);
    }

    #[test]
    fn test_numeric_attribute_names() {
        assert_eq!(attribute_id("Attr-77"), Some(77));
        assert_eq!(attribute_id("attr-4000"), Some(4000));
        assert_eq!(attribute_id("Attr-x"), None);
        assert_eq!(attribute_name(77), "Attr-77");
    }

    #[test]
    fn test_reverse_lookup_prefers_canonical_name() {
        assert_eq!(attribute_name(attr::USER_PASSWORD), "User-Password");
        assert_eq!(attribute_name(attr::HINT), "Hint");
    }

    #[test]
    fn test_local_attribute_range() {
        assert!(!is_local_attribute(attr::SERVICE_TYPE));
        assert!(is_local_attribute(attr::FALL_THROUGH));
        assert!(is_local_attribute(0xffff));
        assert!(!is_local_attribute(0x10000));
        assert!(!is_local_attribute(attr::CISCO_AVPAIR));
    }
}
