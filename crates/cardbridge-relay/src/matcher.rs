//! Advertisement matching against a device specifier.

use cardbridge_core::constants::DEFAULT_NAME_PREFIX;
use cardbridge_core::{Advertisement, DeviceSpecifier};

/// Predicate deciding whether an advertisement is the wanted reader.
///
/// # Examples
///
/// ```
/// use cardbridge_core::{Advertisement, DeviceSpecifier, MacAddress};
/// use cardbridge_relay::DeviceMatcher;
///
/// let matcher = DeviceMatcher::new(&DeviceSpecifier::DefaultPrefix);
/// let adv = Advertisement::new(MacAddress::new([1, 2, 3, 4, 5, 6]), "ACR1555U-J1", -60);
/// assert!(matcher.matches(&adv));
/// ```
#[derive(Debug, Clone)]
pub struct DeviceMatcher {
    specifier: DeviceSpecifier,
}

impl DeviceMatcher {
    pub fn new(specifier: &DeviceSpecifier) -> Self {
        Self {
            specifier: specifier.clone(),
        }
    }

    /// Check if `adv` is the device this matcher looks for.
    pub fn matches(&self, adv: &Advertisement) -> bool {
        match &self.specifier {
            // Advertisements without a name are skipped even when the address matches.
            DeviceSpecifier::Address(mac) => !adv.local_name.is_empty() && adv.address == *mac,
            DeviceSpecifier::ObserveAll => false,
            DeviceSpecifier::DefaultPrefix => adv.local_name.starts_with(DEFAULT_NAME_PREFIX),
            DeviceSpecifier::Name(name) => adv.local_name == *name,
        }
    }

    /// True when the matcher only logs what it sees.
    pub fn is_observe_only(&self) -> bool {
        matches!(self.specifier, DeviceSpecifier::ObserveAll)
    }

    pub fn specifier(&self) -> &DeviceSpecifier {
        &self.specifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbridge_core::MacAddress;
    use proptest::prelude::*;
    use rstest::rstest;

    const READER: MacAddress = MacAddress::new([0xD4, 0x3A, 0x2C, 0x01, 0x02, 0x03]);

    fn adv(address: MacAddress, name: &str) -> Advertisement {
        Advertisement::new(address, name, -60)
    }

    #[rstest]
    #[case("d4:3a:2c:01:02:03", "ACR1555U-J1", true)]
    #[case("D4-3A-2C-01-02-03", "anything", true)]
    #[case("D4:3A:2C:01:02:03", "", false)]
    #[case("D4:3A:2C:01:02:04", "ACR1555U-J1", false)]
    fn test_address_matching(#[case] spec: &str, #[case] name: &str, #[case] expected: bool) {
        let matcher = DeviceMatcher::new(&DeviceSpecifier::parse(spec).unwrap());
        assert_eq!(matcher.matches(&adv(READER, name)), expected);
    }

    #[rstest]
    #[case("ACR1555U", true)]
    #[case("ACR1555U-J1-123456", true)]
    #[case("acr1555u-J1", false)]
    #[case("My ACR1555U", false)]
    #[case("", false)]
    fn test_default_prefix_matching(#[case] name: &str, #[case] expected: bool) {
        let matcher = DeviceMatcher::new(&DeviceSpecifier::DefaultPrefix);
        assert_eq!(matcher.matches(&adv(READER, name)), expected);
    }

    #[rstest]
    #[case("Front Desk", true)]
    #[case("front desk", false)]
    #[case("Front", false)]
    #[case("Front Desk 2", false)]
    fn test_exact_name_matching(#[case] name: &str, #[case] expected: bool) {
        let matcher = DeviceMatcher::new(&DeviceSpecifier::parse("Front Desk").unwrap());
        assert_eq!(matcher.matches(&adv(READER, name)), expected);
    }

    #[test]
    fn test_observe_all_never_matches() {
        let matcher = DeviceMatcher::new(&DeviceSpecifier::ObserveAll);
        assert!(matcher.is_observe_only());
        assert!(!matcher.matches(&adv(READER, "ACR1555U-J1")));
        assert!(!matcher.matches(&adv(READER, "*")));
    }

    proptest! {
        #[test]
        fn prop_address_match_iff_equal(
            target in any::<[u8; 6]>(),
            seen in any::<[u8; 6]>(),
            name in "[A-Za-z0-9 -]{1,16}",
        ) {
            let spec = DeviceSpecifier::parse(&MacAddress::new(target).to_string().to_lowercase()).unwrap();
            let matcher = DeviceMatcher::new(&spec);
            prop_assert_eq!(matcher.matches(&adv(MacAddress::new(seen), &name)), target == seen);
            prop_assert!(!matcher.matches(&adv(MacAddress::new(target), "")));
        }

        #[test]
        fn prop_prefix_with_any_suffix_matches(suffix in ".{0,24}") {
            let matcher = DeviceMatcher::new(&DeviceSpecifier::DefaultPrefix);
            let name = format!("{DEFAULT_NAME_PREFIX}{suffix}");
            prop_assert!(matcher.matches(&adv(READER, &name)));
        }
    }
}
