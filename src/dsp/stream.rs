//! Fixed-block adapter for hosts with variable buffer sizes.
//!
//! Hosts hand over whatever buffer length they like; the filter only accepts
//! whole blocks. Input samples queue in a FIFO until a block is available,
//! the filtered block queues in an output FIFO that starts with one block of
//! silence. Latency is exactly one block.

use crate::dsp::filter::MultirateFilter;
use crate::dsp::sample::Int24;
use ringbuf::{Consumer, Producer, RingBuffer};

// Ring buffer capacity multiplier relative to block length.
const RINGBUF_CAP_MULT: usize = 4;

pub struct BlockStream {
    filter: MultirateFilter,
    in_block: Box<[Int24]>,
    out_block: Box<[Int24]>,
    input_producer: Producer<Int24>,
    input_consumer: Consumer<Int24>,
    output_producer: Producer<Int24>,
    output_consumer: Consumer<Int24>,
}

impl BlockStream {
    pub fn new(filter: MultirateFilter) -> Self {
        let block_len = filter.block_len();
        let buf_cap = block_len * RINGBUF_CAP_MULT;
        let (input_producer, input_consumer) = RingBuffer::<Int24>::new(buf_cap).split();
        let (output_producer, output_consumer) = RingBuffer::<Int24>::new(buf_cap).split();

        let mut stream = Self {
            filter,
            in_block: vec![Int24::ZERO; block_len].into_boxed_slice(),
            out_block: vec![Int24::ZERO; block_len].into_boxed_slice(),
            input_producer,
            input_consumer,
            output_producer,
            output_consumer,
        };
        stream.prime_output();
        stream
    }

    fn prime_output(&mut self) {
        for _ in 0..self.filter.block_len() {
            let _ = self.output_producer.push(Int24::ZERO);
        }
    }

    pub fn latency_samples(&self) -> usize {
        self.filter.block_len()
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let _ = self.input_producer.push(Int24::from_f32(x));
        if self.input_consumer.len() >= self.filter.block_len() {
            self.run_block();
        }
        self.output_consumer.pop().unwrap_or(Int24::ZERO).to_f32()
    }

    /// Filter a host buffer in place.
    pub fn process_slice(&mut self, samples: &mut [f32]) {
        for sample in samples.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    fn run_block(&mut self) {
        for slot in self.in_block.iter_mut() {
            *slot = self.input_consumer.pop().unwrap_or(Int24::ZERO);
        }
        self.filter.process(&self.in_block, &mut self.out_block);
        for &s in self.out_block.iter() {
            let _ = self.output_producer.push(s);
        }
    }

    /// Drop queued audio and return to the freshly opened state.
    pub fn reset(&mut self) {
        while self.input_consumer.pop().is_some() {}
        while self.output_consumer.pop().is_some() {}
        self.prime_output();
        self.filter.reset();
    }

    pub fn filter(&self) -> &MultirateFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut MultirateFilter {
        &mut self.filter
    }
}
