use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::warn;

use assignment_autofill::utils::logging;
use assignment_autofill::{
    cancellation, CompletionJob, Config, JobOrchestrator, LlmService, LocalFileStore, SubscriptionTier,
};

#[derive(Parser)]
#[command(name = "assignment-autofill")]
#[command(about = "自动填写作业文档中的空白处")]
#[command(version)]
struct Cli {
    /// 作业文件（txt / md / csv / docx / 源代码）
    file: String,

    /// 订阅等级：free 或 paid
    #[arg(long, default_value = "free")]
    tier: SubscriptionTier,

    /// 用户 ID
    #[arg(long, default_value = "local")]
    user: String,

    /// 处理类型（仅记录）
    #[arg(long, default_value = "complete_assignment")]
    processing_type: String,

    /// TOML 配置文件，环境变量会覆盖其中的值
    #[arg(long)]
    config: Option<PathBuf>,

    /// 以 JSON 输出作业结果
    #[arg(long)]
    json: bool,

    /// 被 Ctrl+C 中断时仍然写出已完成的部分
    #[arg(long)]
    partial: bool,

    /// 显示详细日志
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref()).context("加载配置失败")?;

    // 初始化日志
    logging::init(cli.verbose || config.verbose_logging);
    logging::init_log_file(&config.output_log_file)?;
    logging::log_startup(&config);

    let generator = Arc::new(LlmService::new(&config));
    let store = Arc::new(LocalFileStore::new());
    let orchestrator = JobOrchestrator::new(config.clone(), generator, store);

    let mut job = CompletionJob::for_file(cli.file, cli.user, cli.tier);
    job.processing_type = cli.processing_type;

    // Ctrl+C 取消生成
    let (handle, signal) = cancellation();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⚠️ 收到中断信号，正在取消作业");
            handle.cancel();
        }
    });

    let result = orchestrator
        .run_with_cancellation(&job, signal, cli.partial)
        .await;

    logging::append_job_record(&config.output_log_file, &result)?;
    logging::print_final_stats(&result, &config.output_log_file);

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("序列化作业结果失败")?
        );
    } else if let Some(file) = &result.completed_file {
        println!("{}", file);
    }

    if !result.is_completed() {
        bail!(
            "作业失败: {}",
            result.error.as_deref().unwrap_or("未知错误")
        );
    }
    Ok(())
}
