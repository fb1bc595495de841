//! Batched light engine driven through a task queue.
//!
//! Callers on any thread queue work as tasks. Tasks are split into `PRE_UPDATE`
//! (setup) and `POST_UPDATE` (completion) phases around each propagation pass, and a
//! pass runs whenever a full batch has accumulated or the owner calls
//! [`ThreadedLevelLightEngine::run_update`].

use std::sync::Arc;

use parking_lot::Mutex;
use steel_utils::{BlockPos, ChunkPos, SectionPos};

use super::{LightLayer, base::LightEventListener, level_light_engine::LevelLightEngine};
use crate::{
    block_model::LightBlockModel,
    config::LightEngineConfig,
    data_layer::DataLayer,
    light_chunk::{LightChunk, LightChunkGetter},
    storage::{BlockStorage, LayerLightReader, SkyStorage},
};

/// When a queued task runs relative to light propagation.
///
/// Each batch is executed in this order:
/// 1. All `PRE_UPDATE` tasks (section status, light enabling, saved data)
/// 2. Light propagation with the configured budget
/// 3. All `POST_UPDATE` tasks (completion callbacks, releasing retained data)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// Tasks executed before light propagation (setup phase).
    PreUpdate,
    /// Tasks executed after light propagation (completion phase).
    PostUpdate,
}

/// Caller code run once a batch has released the engine.
type LightCallback = Box<dyn FnOnce() + Send>;

/// Work against the level engine, run on whichever thread drains the queue.
///
/// A task may hand back a callback. Callbacks run after the engine lock is dropped,
/// so they are free to queue more work.
type LightTask = (
    TaskType,
    Box<dyn FnOnce(&mut LevelLightEngine) -> Option<LightCallback> + Send>,
);

/// A [`LevelLightEngine`] shared between threads.
///
/// Writes go through the task queue; reads of published light go through lock-free
/// readers and never wait for a running batch.
pub struct ThreadedLevelLightEngine {
    /// The engine doing the propagation.
    engine: Mutex<LevelLightEngine>,
    /// Queued tasks waiting to be executed.
    light_tasks: Mutex<Vec<LightTask>>,
    block_reader: Option<LayerLightReader<BlockStorage>>,
    sky_reader: Option<LayerLightReader<SkyStorage>>,
    config: LightEngineConfig,
}

impl ThreadedLevelLightEngine {
    /// Creates a new threaded light engine.
    #[must_use]
    pub fn new(
        chunk_source: Arc<dyn LightChunkGetter>,
        model: Arc<dyn LightBlockModel>,
        config: LightEngineConfig,
    ) -> Self {
        let engine = LevelLightEngine::new(chunk_source, model, &config);
        Self {
            block_reader: engine.block_reader(),
            sky_reader: engine.sky_reader(),
            engine: Mutex::new(engine),
            light_tasks: Mutex::new(Vec::new()),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &LightEngineConfig {
        &self.config
    }

    /// Schedules a re-check of the light around `pos` after a block change.
    pub fn check_block(&self, pos: BlockPos) {
        self.add_task(TaskType::PreUpdate, move |engine| engine.check_block(pos));
    }

    pub fn update_section_status(&self, section: SectionPos, is_empty: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.update_section_status(section, is_empty);
        });
    }

    pub fn set_light_enabled(&self, chunk: ChunkPos, enabled: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.set_light_enabled(chunk, enabled);
        });
    }

    /// Hands in saved light for a section; it is claimed once the section is tracked.
    pub fn queue_section_data(&self, layer: LightLayer, section: SectionPos, data: Option<DataLayer>) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.queue_section_data(layer, section, data);
        });
    }

    pub fn retain_data(&self, chunk: ChunkPos, retain: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| engine.retain_data(chunk, retain));
    }

    /// Initializes lighting for a chunk that was just loaded or generated.
    ///
    /// 1. `PRE_UPDATE` task: marks every section holding a block as non-empty
    /// 2. `POST_UPDATE` task: enables light for the column and drops the retain hint
    ///
    /// This does not place any light. Sources are seeded by [`Self::light_chunk`].
    pub fn initialize_light(&self, chunk: Arc<dyn LightChunk>, pos: ChunkPos, light_enabled: bool) {
        self.add_task(TaskType::PreUpdate, move |engine| {
            let height = engine.level_height();
            for section_y in height.min_section_y()..height.max_section_y() {
                if !chunk.section_has_only_air(section_y) {
                    engine.update_section_status(SectionPos::of_chunk(pos, section_y), false);
                }
            }
        });
        self.add_task(TaskType::PostUpdate, move |engine| {
            engine.set_light_enabled(pos, light_enabled);
            engine.retain_data(pos, false);
        });
    }

    /// Lights a chunk and calls `on_done` once its light is complete.
    ///
    /// A chunk whose light was loaded from disk (`is_lighted`) only gets light enabled;
    /// sources are seeded for the rest. `on_done` runs outside the engine lock and may
    /// queue further work on this engine.
    pub fn light_chunk<F>(&self, pos: ChunkPos, is_lighted: bool, on_done: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.add_task(TaskType::PreUpdate, move |engine| {
            engine.set_light_enabled(pos, true);
            if !is_lighted {
                engine.propagate_light_sources(pos);
            }
        });
        self.push_task(
            TaskType::PostUpdate,
            Box::new(move |engine: &mut LevelLightEngine| {
                engine.retain_data(pos, false);
                Some(Box::new(on_done) as LightCallback)
            }),
        );
    }

    /// Adds a task to the queue, running a batch right away once it is full.
    fn add_task<F>(&self, task_type: TaskType, task: F)
    where
        F: FnOnce(&mut LevelLightEngine) + Send + 'static,
    {
        self.push_task(
            task_type,
            Box::new(move |engine: &mut LevelLightEngine| -> Option<LightCallback> {
                task(engine);
                None
            }),
        );
    }

    fn push_task(
        &self,
        task_type: TaskType,
        task: Box<dyn FnOnce(&mut LevelLightEngine) -> Option<LightCallback> + Send>,
    ) {
        let mut tasks = self.light_tasks.lock();
        tasks.push((task_type, task));
        let batch_ready = tasks.len() >= self.config.task_batch_size.get();
        drop(tasks);

        if batch_ready {
            self.run_update();
        }
    }

    /// Runs one batch of queued tasks and light propagation.
    ///
    /// Execution order:
    /// 1. Execute the batch's `PRE_UPDATE` tasks
    /// 2. Run light propagation within the update budget
    /// 3. Execute the batch's `POST_UPDATE` tasks
    ///
    /// When the budget leaves propagation unfinished, the `POST_UPDATE` tasks go back
    /// to the front of the queue so completion callbacks only ever see finished light.
    /// Callbacks handed back by completion tasks run after the engine is unlocked.
    ///
    /// Returns the number of light updates processed.
    pub fn run_update(&self) -> usize {
        let batch: Vec<LightTask> = {
            let mut tasks = self.light_tasks.lock();
            let count = tasks.len().min(self.config.task_batch_size.get());
            tasks.drain(..count).collect()
        };

        let (pre_update_tasks, post_update_tasks): (Vec<_>, Vec<_>) = batch
            .into_iter()
            .partition(|(task_type, _)| *task_type == TaskType::PreUpdate);

        let mut engine = self.engine.lock();
        let mut callbacks = Vec::new();
        let pre_count = pre_update_tasks.len();
        for (_, task) in pre_update_tasks {
            callbacks.extend(task(&mut *engine));
        }

        let processed = engine.run_light_updates_with_budget(self.config.update_budget);

        let post_count = post_update_tasks.len();
        if engine.has_light_work() && post_count > 0 {
            let mut tasks = self.light_tasks.lock();
            let queued = std::mem::replace(&mut *tasks, post_update_tasks);
            tasks.extend(queued);
            log::debug!("Light batch: {pre_count} setup tasks, {processed} updates, completion deferred");
        } else {
            for (_, task) in post_update_tasks {
                callbacks.extend(task(&mut *engine));
            }
            log::debug!(
                "Light batch: {pre_count} setup tasks, {processed} updates, {post_count} completion tasks"
            );
        }
        drop(engine);

        for callback in callbacks {
            callback();
        }
        processed
    }

    /// Checks if there are any pending tasks or light updates.
    #[must_use]
    pub fn has_work(&self) -> bool {
        let tasks = self.light_tasks.lock();
        let has_tasks = !tasks.is_empty();
        drop(tasks);

        has_tasks || self.engine.lock().has_light_work()
    }

    #[must_use]
    pub fn queued_task_count(&self) -> usize {
        self.light_tasks.lock().len()
    }

    /// Published light at `pos`, read without waiting for the engine.
    #[must_use]
    pub fn light_value(&self, layer: LightLayer, pos: BlockPos) -> u8 {
        match layer {
            LightLayer::Block => self
                .block_reader
                .as_ref()
                .map_or(0, |reader| reader.get_light_value(pos)),
            LightLayer::Sky => self
                .sky_reader
                .as_ref()
                .map_or(0, |reader| reader.get_light_value(pos)),
        }
    }

    /// Published light layer of a section, for saving or sending.
    #[must_use]
    pub fn data_layer(&self, layer: LightLayer, section: SectionPos) -> Option<Arc<DataLayer>> {
        match layer {
            LightLayer::Block => self.block_reader.as_ref()?.get_data_layer(section),
            LightLayer::Sky => self.sky_reader.as_ref()?.get_data_layer(section),
        }
    }

    /// Runs `f` with exclusive access to the engine, blocking any running batch.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut LevelLightEngine) -> R) -> R {
        f(&mut *self.engine.lock())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        num::NonZeroUsize,
        sync::{
            Arc,
            atomic::{AtomicBool, AtomicUsize, Ordering},
            mpsc,
        },
        thread,
        time::Duration,
    };

    use steel_utils::{BlockPos, ChunkPos};

    use super::*;
    use crate::testing::{TestBlocks, TestWorld};

    fn threaded(world: &Arc<TestWorld>, config: LightEngineConfig) -> ThreadedLevelLightEngine {
        ThreadedLevelLightEngine::new(world.clone(), Arc::new(TestBlocks), config)
    }

    fn load_all(world: &TestWorld, engine: &ThreadedLevelLightEngine) {
        for chunk in world.chunks() {
            chunk.refresh_sky_sources();
            let pos = chunk.pos();
            let chunk: Arc<dyn LightChunk> = chunk;
            engine.initialize_light(chunk, pos, true);
        }
    }

    fn drain(engine: &ThreadedLevelLightEngine) {
        while engine.has_work() {
            engine.run_update();
        }
    }

    #[test]
    fn test_light_chunk_calls_back_after_light() {
        let world = Arc::new(TestWorld::new(-64, 384, 1));
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::TORCH);
        let engine = threaded(&world, LightEngineConfig::default());
        load_all(&world, &engine);

        let done = Arc::new(AtomicUsize::new(0));
        for chunk in world.chunks() {
            let done = done.clone();
            engine.light_chunk(chunk.pos(), false, move || {
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(done.load(Ordering::SeqCst), 0);
        assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(8, 64, 8)), 0);

        drain(&engine);
        assert_eq!(done.load(Ordering::SeqCst), 9);
        assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(8, 64, 8)), 14);
        assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(8, 64, 12)), 10);
        assert_eq!(engine.light_value(LightLayer::Sky, BlockPos::new(8, 100, 8)), 15);
    }

    #[test]
    fn test_full_batch_runs_eagerly() {
        let world = Arc::new(TestWorld::new(-64, 384, 0));
        let config = LightEngineConfig {
            task_batch_size: NonZeroUsize::new(3).unwrap(),
            ..LightEngineConfig::default()
        };
        let engine = threaded(&world, config);

        engine.check_block(BlockPos::new(0, 0, 0));
        engine.check_block(BlockPos::new(1, 0, 0));
        assert_eq!(engine.queued_task_count(), 2);
        engine.check_block(BlockPos::new(2, 0, 0));
        assert_eq!(engine.queued_task_count(), 0);
    }

    #[test]
    fn test_budget_defers_completion() {
        let world = Arc::new(TestWorld::new(-64, 384, 1));
        world.put_block(BlockPos::new(8, 64, 8), TestBlocks::TORCH);
        let config = LightEngineConfig {
            update_budget: NonZeroUsize::new(64),
            ..LightEngineConfig::default()
        };
        let engine = threaded(&world, config);
        load_all(&world, &engine);

        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        engine.light_chunk(ChunkPos::new(0, 0), false, move || flag.store(true, Ordering::SeqCst));
        for chunk in world.chunks() {
            if chunk.pos() != ChunkPos::new(0, 0) {
                engine.light_chunk(chunk.pos(), false, || {});
            }
        }

        assert_eq!(engine.run_update(), 64);
        assert!(!done.load(Ordering::SeqCst));
        assert!(engine.has_work());

        drain(&engine);
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(9, 64, 8)), 13);
    }

    #[test]
    fn test_block_change_relights() {
        let world = Arc::new(TestWorld::new(-64, 384, 1));
        let engine = threaded(&world, LightEngineConfig::default());
        load_all(&world, &engine);
        for chunk in world.chunks() {
            engine.light_chunk(chunk.pos(), false, || {});
        }
        drain(&engine);

        let pos = BlockPos::new(4, 70, 4);
        world.put_block(pos, TestBlocks::TORCH);
        engine.update_section_status(SectionPos::of_block(pos), false);
        engine.check_block(pos);
        assert_eq!(engine.light_value(LightLayer::Block, pos), 0);
        drain(&engine);
        assert_eq!(engine.light_value(LightLayer::Block, pos), 14);
        assert!(engine.data_layer(LightLayer::Block, SectionPos::of_block(pos)).is_some());
    }

    #[test]
    fn test_saved_light_through_queue() {
        let world = Arc::new(TestWorld::new(-64, 384, 0));
        let engine = threaded(&world, LightEngineConfig::default());
        let section = SectionPos::new(0, 1, 0);

        engine.retain_data(ChunkPos::new(0, 0), true);
        engine.queue_section_data(LightLayer::Block, section, Some(DataLayer::filled(7)));
        engine.update_section_status(section, false);
        drain(&engine);

        assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(5, 20, 5)), 7);
        let tracked = engine.with_engine(|engine| {
            engine.debug_section_type(LightLayer::Block, section)
        });
        assert_eq!(tracked, crate::storage::SectionType::LightAndData);
    }

    #[test]
    fn test_completion_callback_can_queue_work() {
        let world = Arc::new(TestWorld::new(-64, 384, 0));
        let config = LightEngineConfig {
            task_batch_size: NonZeroUsize::new(1).unwrap(),
            ..LightEngineConfig::default()
        };
        let engine = Arc::new(threaded(&world, config));
        let torch = BlockPos::new(8, 40, 8);

        let (sender, receiver) = mpsc::channel();
        let worker = {
            let engine = engine.clone();
            let world = world.clone();
            thread::spawn(move || {
                let inner = engine.clone();
                engine.light_chunk(ChunkPos::new(0, 0), false, move || {
                    world.put_block(torch, TestBlocks::TORCH);
                    inner.update_section_status(SectionPos::of_block(torch), false);
                    inner.check_block(torch);
                });
                sender.send(()).unwrap();
            })
        };

        assert!(
            receiver.recv_timeout(Duration::from_secs(10)).is_ok(),
            "queueing work from a completion callback blocked the engine"
        );
        worker.join().unwrap();
        assert!(!engine.has_work());
        assert_eq!(engine.light_value(LightLayer::Block, torch), 14);
        assert_eq!(engine.light_value(LightLayer::Block, BlockPos::new(8, 40, 11)), 11);
    }
}
