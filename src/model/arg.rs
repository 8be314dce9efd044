use clap::{Parser, Subcommand};

/// LayerEdge 轻节点多账号挂机
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 运行所有账号（默认）
    Run {
        /// 每个会话的循环轮数，0 表示不限
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// 生成新钱包并写入待注册文件
    Generate {
        #[arg(long, default_value_t = 5)]
        count: usize,
    },
    /// 用邀请码注册待注册钱包
    Register {
        #[arg(long)]
        referral_code: Option<String>,
    },
}

impl Args {
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or(Command::Run { cycles: None })
    }
}
