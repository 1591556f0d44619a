use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod build;
mod check;
mod config;
mod dev;
mod init;
mod paths;
mod transform;

use build::Mode;
use build::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "assetpipe", about = "前端静态资源构建工具", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// 开发构建，随后监听源码并启动实时刷新预览服务
    #[command(alias = "default")]
    Dev {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,

        /// 监听端口（覆盖配置）
        #[arg(long)]
        port: Option<u16>,
    },

    /// 生产构建：压缩、指纹、打包
    Prod {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 单独执行一个任务（不运行其依赖）
    Task {
        /// 任务名：clean、vendor、sprite、html、css、js、img、archive
        name: String,

        /// 使用生产模式的任务实现
        #[arg(long)]
        prod: bool,

        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 检查项目配置与目录结构
    Check {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// 创建默认配置与源码骨架
    Init {
        /// 项目根目录（默认当前目录）
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },
}

impl Commands {
    fn root(&self) -> &PathBuf {
        match self {
            Commands::Dev { root, .. }
            | Commands::Prod { root }
            | Commands::Task { root, .. }
            | Commands::Check { root }
            | Commands::Init { root } => root,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 无子命令时等同于 dev
    let command = cli.command.unwrap_or(Commands::Dev {
        root: PathBuf::from("."),
        port: None,
    });

    // 使用配置中的日志级别作为默认值，RUST_LOG 优先
    let root = command.root();
    let default_level =
        config::ProjectConfig::load(&root.canonicalize().unwrap_or_else(|_| root.clone()))
            .ok()
            .map(|c| c.server.log_level);
    let default_level = default_level.as_deref().unwrap_or("info");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match command {
        Commands::Dev { root, port } => {
            let root = root.canonicalize()?;
            let project_config = config::ProjectConfig::load(&root)?;

            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(async move { dev::start(&root, project_config, port).await })?;
        }
        Commands::Prod { root } => {
            let root = root.canonicalize()?;
            let project_config = config::ProjectConfig::load(&root)?;
            project_config.validate()?;
            let stats = build::run(&root, &project_config, Pipeline::Prod)?;
            for (logical, hashed) in stats.manifest.iter() {
                tracing::debug!("{logical} → {hashed}");
            }
            tracing::info!("已生成 {} 个带指纹的文件", stats.manifest.len());
        }
        Commands::Task { name, prod, root } => {
            let root = root.canonicalize()?;
            let project_config = config::ProjectConfig::load(&root)?;
            project_config.validate()?;
            let mode = if prod { Mode::Prod } else { Mode::Dev };
            let files = build::run_single(&root, &project_config, &name, mode)?;
            tracing::info!("任务 {name}（{}）完成，写出 {files} 个文件", mode.name());
        }
        Commands::Check { root } => {
            let root = root.canonicalize()?;
            let result = check::run(&root)?;

            for w in &result.warnings {
                tracing::warn!("{w}");
            }
            for e in &result.errors {
                tracing::error!("{e}");
            }

            if result.errors.is_empty() {
                tracing::info!("检查通过（{} 个警告）", result.warnings.len());
            } else {
                anyhow::bail!(
                    "检查未通过：{} 个错误，{} 个警告",
                    result.errors.len(),
                    result.warnings.len()
                );
            }
        }
        Commands::Init { root } => {
            std::fs::create_dir_all(&root)?;
            let root = root.canonicalize()?;
            if init::ensure_initialized(&root)? {
                tracing::info!("已初始化项目：{}", root.display());
            } else {
                tracing::info!("{} 已存在，跳过初始化", config::CONFIG_FILE);
            }
        }
    }

    Ok(())
}
