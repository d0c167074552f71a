mod context;
mod fanout;
mod queue;

pub use context::{FanoutWorkerContext, job_failed, with_time_limit};
pub use fanout::{
    FANOUT_JOB_OPTIONS, FanoutBatchJobPayload, FanoutMainJobPayload,
    FanoutSummary, enqueue_fanout_batch_job, enqueue_fanout_main_job, process_fanout_batch_job,
    process_fanout_main_job, run_fanout_batch, run_fanout_main,
};
pub use queue::{JobOptions, enqueue_job};
