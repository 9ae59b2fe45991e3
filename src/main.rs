use anyhow::{anyhow, Context};
use dapper::ap::{Ap, IDR_ADDR};
use dapper::cmsisdap::tools::{list_cmsisdap_devices, open_device_from_selector, DebugProbeSelector};
use dapper::dp::DPIDR_ADDR;
use dapper::Session;

fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt::init();

    let selector = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<DebugProbeSelector>().context("invalid probe selector")?,
        None => {
            let devs = list_cmsisdap_devices();
            for dev in &devs {
                tracing::info!("found probe: {}", dev);
            }
            let dev = devs.first().ok_or_else(|| anyhow!("no CMSIS-DAP probe found"))?;
            DebugProbeSelector::from(dev)
        }
    };

    let dev = open_device_from_selector(&selector)?;
    let mut session = Session::new(dev);

    let info = session.probe_dap_info()?;
    tracing::info!("probe: {} {} ({})", info.vendor_name, info.product_name, info.serial_number);
    tracing::info!("firmware: {:?}", info.firmware);
    tracing::info!("capabilities: {:?}", info.capabilities);

    let dp = session.connect()?;
    tracing::info!("{}", dp.dpidr);

    let x = session.coresight_read(false, DPIDR_ADDR)?;
    tracing::debug!("dpidr {:#x}", x);

    let x = Ap::new(0).read(&mut session, IDR_ADDR)?;
    tracing::info!("ap 0 idr {:#x}", x);

    session.disconnect()?;
    Ok(())
}
