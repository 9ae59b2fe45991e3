use std::fmt;

use hidapi::HidApi;
use nusb::transfer::{Direction, EndpointType};
use nusb::DeviceInfo;

use super::commands::packet::DEFAULT_PACKET_SIZE;
use super::device::CmsisDapDevice;

const USB_CLASS_HID: u8 = 0x03;

/// USB vendor IDs of the probes this crate drives: ARM (DAPLink) and NXP
/// (LPC-Link2, MCU-Link).
pub const SUPPORTED_VENDOR_IDS: [u16; 2] = [0x0D28, 0x1FC9];

/// The USB vendor IDs of supported probes.
pub fn supported_vendor_ids() -> &'static [u16] {
    &SUPPORTED_VENDOR_IDS
}

/// A probe found during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugProbeInfo {
    /// Product string of the probe.
    pub identifier: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,

    /// The USB HID interface to use on composite devices.
    pub hid_interface: Option<u8>,
}

impl fmt::Display for DebugProbeInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} -- {:04x}:{:04x}:{}",
            self.identifier,
            self.vendor_id,
            self.product_id,
            self.serial_number.as_deref().unwrap_or(""),
        )
    }
}

/// Failure to find or claim a probe.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum OpenError {
    /// No CMSIS-DAP probe matches {0}
    NotFound(DebugProbeSelector),
    /// Error in the USB HID access
    Hid(#[from] hidapi::HidError),
}

/// Malformed `VID:PID[:SERIAL]` string.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum SelectorParseError {
    /// Expected VID:PID or VID:PID:SERIAL
    Format,
    /// Invalid hexadecimal USB ID
    InvalidId(#[from] std::num::ParseIntError),
}

/// Finds all supported CMSIS-DAP probes, either v1 (HID) or v2 (bulk).
///
/// Reading device strings through nusb can fail because of permissions or
/// drivers, so HID devices are scanned as well and merged in.
#[tracing::instrument(skip_all)]
pub fn list_cmsisdap_devices() -> Vec<DebugProbeInfo> {
    tracing::debug!("Searching for CMSIS-DAP probes using nusb");

    let mut probes: Vec<DebugProbeInfo> = match nusb::list_devices() {
        Ok(devices) => devices.filter_map(|device| get_cmsisdap_info(&device)).collect(),
        Err(e) => {
            tracing::warn!("error listing devices with nusb: {:?}", e);
            vec![]
        }
    };

    tracing::debug!("Found {} CMSIS-DAP probes using nusb, searching HID", probes.len());

    if let Ok(api) = HidApi::new() {
        for info in api.device_list().filter_map(get_cmsisdap_hid_info) {
            if probes.iter().any(|p| is_same_probe(p, &info)) {
                tracing::trace!("Ignoring duplicate {:?}", info);
            } else {
                tracing::trace!("Adding new HID-only probe {:?}", info);
                probes.push(info);
            }
        }
    }

    tracing::debug!("Found {} CMSIS-DAP probes total", probes.len());
    probes
}

fn is_same_probe(a: &DebugProbeInfo, b: &DebugProbeInfo) -> bool {
    a.vendor_id == b.vendor_id && a.product_id == b.product_id && a.serial_number == b.serial_number
}

/// Checks if a USB device is a supported CMSIS-DAP probe.
fn get_cmsisdap_info(device: &DeviceInfo) -> Option<DebugProbeInfo> {
    if !is_supported_vendor(device.vendor_id()) {
        return None;
    }

    let prod_str = device.product_string().unwrap_or("");

    // Look for interfaces named like CMSIS-DAP, remembering a HID one for
    // v1 operation.
    let mut cmsis_dap_interface = false;
    let mut hid_interface = None;
    for interface in device.interfaces() {
        let Some(interface_desc) = interface.interface_string() else {
            continue;
        };
        if is_cmsis_dap(interface_desc) {
            tracing::trace!("  Interface {}: {}", interface.interface_number(), interface_desc);
            cmsis_dap_interface = true;
            if interface.class() == USB_CLASS_HID {
                hid_interface = Some(interface.interface_number());
            }
        }
    }

    if !cmsis_dap_interface && !is_cmsis_dap(prod_str) {
        return None;
    }

    tracing::trace!("{}: CMSIS-DAP device, HID interface {:?}", prod_str, hid_interface);
    Some(DebugProbeInfo {
        identifier: prod_str.to_string(),
        vendor_id: device.vendor_id(),
        product_id: device.product_id(),
        serial_number: device.serial_number().map(Into::into),
        hid_interface,
    })
}

/// Checks if a HID device is a supported CMSIS-DAP v1 probe.
fn get_cmsisdap_hid_info(device: &hidapi::DeviceInfo) -> Option<DebugProbeInfo> {
    if !is_supported_vendor(device.vendor_id()) {
        return None;
    }

    let prod_str = device.product_string().unwrap_or("");
    let path = device.path().to_str().unwrap_or("");
    if !is_cmsis_dap(prod_str) && !is_cmsis_dap(path) {
        return None;
    }

    tracing::trace!("CMSIS-DAP HID device {:?}, interface {}", device.path(), device.interface_number());
    Some(DebugProbeInfo {
        identifier: prod_str.to_owned(),
        vendor_id: device.vendor_id(),
        product_id: device.product_id(),
        serial_number: device.serial_number().map(|s| s.to_owned()),
        hid_interface: u8::try_from(device.interface_number()).ok(),
    })
}

/// Attempt to open the given device in CMSIS-DAP v2 mode.
pub fn open_v2_device(device_info: &DeviceInfo) -> Option<CmsisDapDevice> {
    let vid = device_info.vendor_id();
    let pid = device_info.product_id();

    let device = device_info.open().ok()?;

    // v2 interfaces are recognised by their "CMSIS-DAP" string and a bulk
    // OUT endpoint followed by a bulk IN endpoint. A third endpoint, if
    // present, carries SWO and is not used.
    let c_desc = device.configurations().next()?;
    for interface in c_desc.interfaces() {
        let named_cmsis_dap = device_info
            .interfaces()
            .find(|i| i.interface_number() == interface.interface_number())
            .and_then(|i| i.interface_string())
            .is_some_and(is_cmsis_dap);
        if !named_cmsis_dap {
            continue;
        }

        for i_desc in interface.alt_settings() {
            let eps: Vec<_> = i_desc.endpoints().collect();
            if !(2..=3).contains(&eps.len()) {
                continue;
            }
            if eps[0].transfer_type() != EndpointType::Bulk || eps[0].direction() != Direction::Out {
                continue;
            }
            if eps[1].transfer_type() != EndpointType::Bulk || eps[1].direction() != Direction::In {
                continue;
            }

            match device.claim_interface(interface.interface_number()) {
                Ok(handle) => {
                    tracing::debug!("Opening {:04x}:{:04x} in CMSIS-DAPv2 mode", vid, pid);
                    return Some(CmsisDapDevice::V2 {
                        handle,
                        out_ep: eps[0].address(),
                        in_ep: eps[1].address(),
                        max_packet_size: eps[1].max_packet_size(),
                    });
                }
                Err(e) => tracing::debug!("Could not claim interface {}: {}", interface.interface_number(), e),
            }
        }
    }

    tracing::debug!("Could not open {:04x}:{:04x} in CMSIS-DAP v2 mode", vid, pid);
    None
}

/// Selects a probe by `VID:PID` or `VID:PID:SERIAL`, IDs in hex.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct DebugProbeSelector {
    pub vendor_id: u16,
    pub product_id: u16,
    pub serial_number: Option<String>,
}

impl TryFrom<&str> for DebugProbeSelector {
    type Error = SelectorParseError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // The serial number may itself contain colons.
        let mut split = value.splitn(3, ':');

        let vendor_id = split.next().ok_or(SelectorParseError::Format)?;
        let product_id = split.next().ok_or(SelectorParseError::Format)?;
        let serial_number = split.next().filter(|s| !s.is_empty()).map(|s| s.to_string());

        Ok(DebugProbeSelector {
            vendor_id: u16::from_str_radix(vendor_id, 16)?,
            product_id: u16::from_str_radix(product_id, 16)?,
            serial_number,
        })
    }
}

impl TryFrom<String> for DebugProbeSelector {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TryFrom::<&str>::try_from(&value)
    }
}

impl std::str::FromStr for DebugProbeSelector {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TryFrom::<&str>::try_from(s)
    }
}

impl DebugProbeSelector {
    fn matches(&self, vendor_id: u16, product_id: u16, serial_number: Option<&str>) -> bool {
        vendor_id == self.vendor_id
            && product_id == self.product_id
            && self
                .serial_number
                .as_deref()
                .map_or(true, |s| serial_number == Some(s))
    }
}

impl From<&DebugProbeInfo> for DebugProbeSelector {
    fn from(info: &DebugProbeInfo) -> Self {
        DebugProbeSelector {
            vendor_id: info.vendor_id,
            product_id: info.product_id,
            serial_number: info.serial_number.clone(),
        }
    }
}

impl fmt::Display for DebugProbeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)?;
        if let Some(ref sn) = self.serial_number {
            write!(f, ":{sn}")?;
        }
        Ok(())
    }
}

/// Opens the probe matching `selector`, in CMSIS-DAP v2 mode if possible,
/// otherwise in v1 (HID) mode. Any stale responses are drained.
pub fn open_device_from_selector(selector: &DebugProbeSelector) -> Result<CmsisDapDevice, OpenError> {
    tracing::trace!("Attempting to open device matching {}", selector);

    let device = open_v2_from_selector(selector).or_else(|hid_interface| open_v1(selector, hid_interface))?;
    device.drain();
    Ok(device)
}

/// Tries v2 mode. On failure, returns the HID interface nusb found for the
/// probe, if any, so v1 opens the right one on composite devices.
fn open_v2_from_selector(selector: &DebugProbeSelector) -> Result<CmsisDapDevice, Option<u8>> {
    let Ok(devices) = nusb::list_devices() else {
        tracing::debug!("Could not list devices using nusb");
        return Err(None);
    };

    let mut hid_interface = None;
    for device in devices {
        if !selector.matches(device.vendor_id(), device.product_id(), device.serial_number()) {
            continue;
        }
        if let Some(info) = get_cmsisdap_info(&device) {
            hid_interface = info.hid_interface;
            if let Some(device) = open_v2_device(&device) {
                return Ok(device);
            }
        }
    }
    Err(hid_interface)
}

fn open_v1(selector: &DebugProbeSelector, hid_interface: Option<u8>) -> Result<CmsisDapDevice, OpenError> {
    tracing::debug!(
        "Attempting to open {:04x}:{:04x} in CMSIS-DAP v1 mode",
        selector.vendor_id,
        selector.product_id
    );

    let hid_api = HidApi::new()?;

    // HidApi::open() would pick the first interface of a composite device,
    // so match the interface number by hand.
    let device_info = hid_api
        .device_list()
        .find(|info| {
            selector.matches(info.vendor_id(), info.product_id(), info.serial_number())
                && hid_interface.map_or(true, |i| info.interface_number() == i as i32)
        })
        .ok_or_else(|| OpenError::NotFound(selector.clone()))?;

    let device = device_info.open_device(&hid_api)?;

    match device.get_product_string() {
        Ok(Some(s)) if is_cmsis_dap(&s) => Ok(CmsisDapDevice::V1 {
            handle: device,
            // Most v1 probes use 64 byte reports; the real size is read
            // from the probe after connecting.
            report_size: DEFAULT_PACKET_SIZE,
        }),
        _ => Err(OpenError::NotFound(selector.clone())),
    }
}

/// CMSIS-DAP interfaces and products carry a "CMSIS-DAP" like string,
/// spelled in a few different ways.
fn is_cmsis_dap(id: &str) -> bool {
    id.contains("CMSIS-DAP") || id.contains("CMSIS_DAP")
}

fn is_supported_vendor(vendor_id: u16) -> bool {
    SUPPORTED_VENDOR_IDS.contains(&vendor_id)
}
