use std::path::PathBuf;
use std::process::ExitCode;

use ocular_app::app;
use ocular_app::config::AppConfig;

/// panic 信息同时写入日志
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log::error!("{info}");
        default_hook(info);
    }));
}

fn main() -> ExitCode {
    ocular_crate_tools::init_log::init_log();
    install_panic_hook();
    let _tracy = tracy_client::Client::start();

    // 第一个参数为配置文件路径
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let result = AppConfig::load(config_path.as_deref()).and_then(|config| app::run(&config));
    match result {
        Ok(exit) => {
            log::info!("ocular exited: {exit:?}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err:?}");
            ExitCode::FAILURE
        }
    }
}
