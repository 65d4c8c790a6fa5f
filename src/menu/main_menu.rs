use crate::config::save::save_settings;
use crate::config::{Config, ExecutionMode};
use crate::menu::handlers::run_slide_extractor;
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== 投影片擷取工具 ===").cyan().bold());
    println!("{}", style("按 ESC 返回").dim());

    let options = vec!["擷取投影片並輸出 PDF", "設定", "離開"];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇功能")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_slide_extractor(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            show_settings_menu(term, config)?;
            Ok(true)
        }
        Some(2) | None => Ok(false),
        _ => unreachable!(),
    }
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== 設定 ===").cyan().bold());
        println!("{}", style("按 ESC 返回").dim());

        let settings = &config.settings;
        let workers = settings
            .max_workers
            .map_or_else(|| "自動".to_string(), |n| n.to_string());
        let options = vec![
            format!("相似度閾值 (目前: {})", settings.similarity_threshold),
            format!("執行模式 (目前: {})", settings.execution_mode),
            format!("平行工作數 (目前: {workers})"),
            "返回".to_string(),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("請選擇要修改的設定")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        match selection {
            Some(0) => show_threshold_menu(config)?,
            Some(1) => show_execution_mode_menu(term, config)?,
            Some(2) => show_worker_menu(config)?,
            Some(3) | None => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn show_threshold_menu(config: &mut Config) -> Result<()> {
    let threshold: f64 = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("相似度閾值 (0 < 值 <= 1，越高收錄越多)")
        .default(config.settings.similarity_threshold)
        .validate_with(|value: &f64| -> Result<(), &str> {
            if *value > 0.0 && *value <= 1.0 {
                Ok(())
            } else {
                Err("閾值必須介於 0 與 1 之間")
            }
        })
        .interact_text()?;

    if (threshold - config.settings.similarity_threshold).abs() > f64::EPSILON {
        config.settings.similarity_threshold = threshold;
        save_and_notify(config, &threshold)?;
    }

    Ok(())
}

fn show_execution_mode_menu(term: &Term, config: &mut Config) -> Result<()> {
    term.clear_screen()?;

    println!("{}", style("=== 執行模式 ===").cyan().bold());
    println!(
        "\n{} {}\n",
        style("目前設定:").dim(),
        config.settings.execution_mode
    );

    let modes = [ExecutionMode::Sequential, ExecutionMode::Concurrent];
    let items: Vec<String> = modes.iter().map(ToString::to_string).collect();

    let default_index = modes
        .iter()
        .position(|&m| m == config.settings.execution_mode)
        .unwrap_or(0);

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("請選擇執行模式")
        .items(&items)
        .default(default_index)
        .interact_on_opt(term)?;

    // ESC - 不儲存
    let Some(selection) = selection else {
        return Ok(());
    };

    let selected_mode = modes[selection];
    if selected_mode != config.settings.execution_mode {
        config.settings.execution_mode = selected_mode;
        save_and_notify(config, &selected_mode)?;
    }

    Ok(())
}

fn show_worker_menu(config: &mut Config) -> Result<()> {
    let workers: usize = Input::with_theme(&ColorfulTheme::default())
        .with_prompt("平行工作數 (0 為自動)")
        .default(config.settings.max_workers.unwrap_or(0))
        .interact_text()?;

    let max_workers = (workers > 0).then_some(workers);
    if max_workers != config.settings.max_workers {
        config.settings.max_workers = max_workers;
        save_and_notify(config, &config.settings.worker_count())?;
    }

    Ok(())
}

fn save_and_notify(config: &Config, value: &dyn std::fmt::Display) -> Result<()> {
    save_settings(&config.settings)?;
    println!("\n{} {}", style("設定已儲存:").green(), value);
    std::thread::sleep(std::time::Duration::from_secs(1));
    Ok(())
}
