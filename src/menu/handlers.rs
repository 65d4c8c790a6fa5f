use crate::component::SlideExtractor;
use crate::config::Config;
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn run_slide_extractor(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<()> {
    let mut extractor = SlideExtractor::new(config.clone(), Arc::clone(shutdown_signal));

    if let Err(e) = extractor.run() {
        eprintln!("{} {:#}", style("錯誤:").red().bold(), e);
    }
    // 帶回更新過的最近使用資料夾
    *config = extractor.into_config();

    pause(term)?;
    Ok(())
}
