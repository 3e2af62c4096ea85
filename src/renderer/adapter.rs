/// Description of one enumerated physical device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Position in enumeration order
    pub index: usize,
    pub name: String,
    pub vendor_id: u32,
    pub api_version: u32,
}

/// Picks the adapter to create the device on.
///
/// The first adapter whose name contains `preferred` wins; without a match the
/// first adapter in enumeration order is used. The match is case-sensitive.
pub fn select_adapter<'a>(
    adapters: &'a [AdapterInfo],
    preferred: Option<&str>,
) -> Option<&'a AdapterInfo> {
    if let Some(preferred) = preferred {
        if let Some(adapter) = adapters
            .iter()
            .find(|adapter| adapter.name.contains(preferred))
        {
            return Some(adapter);
        }
        log::info!("No adapter matching {:?}, using enumeration order", preferred);
    }

    adapters.first()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(index: usize, name: &str) -> AdapterInfo {
        AdapterInfo {
            index,
            name: name.to_owned(),
            vendor_id: 0,
            api_version: 0,
        }
    }

    #[test]
    fn prefers_first_name_match() {
        let adapters = [
            adapter(0, "Intel(R) UHD Graphics 630"),
            adapter(1, "NVIDIA GeForce RTX 3070"),
            adapter(2, "NVIDIA GeForce GTX 1050"),
        ];

        let selected = select_adapter(&adapters, Some("NVIDIA")).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn falls_back_to_enumeration_order() {
        let adapters = [
            adapter(0, "AMD Radeon RX 6800"),
            adapter(1, "llvmpipe (LLVM 17.0.6, 256 bits)"),
        ];

        assert_eq!(select_adapter(&adapters, Some("NVIDIA")).unwrap().index, 0);
        assert_eq!(select_adapter(&adapters, None).unwrap().index, 0);
    }

    #[test]
    fn match_is_case_sensitive() {
        let adapters = [adapter(0, "Intel Arc A770"), adapter(1, "nvidia tegra")];

        assert_eq!(select_adapter(&adapters, Some("NVIDIA")).unwrap().index, 0);
    }

    #[test]
    fn no_adapters_selects_nothing() {
        assert!(select_adapter(&[], Some("NVIDIA")).is_none());
    }
}
