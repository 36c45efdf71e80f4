use crate::{arbitration, config, lookup, port, slot_table::Tag};
use console::style;

/// Packets that carry a routable tag.
pub trait Tagged {
    fn tag(&self) -> Tag;
    fn set_tag(&mut self, tag: Tag);
}

impl Tagged for lookup::Request {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn set_tag(&mut self, tag: Tag) {
        self.tag = tag;
    }
}

impl Tagged for lookup::Response {
    fn tag(&self) -> Tag {
        self.tag
    }

    fn set_tag(&mut self, tag: Tag) {
        self.tag = tag;
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("response tag {tag} routes to unknown input {input}")]
    UnknownRoute { tag: Tag, input: usize },
    #[error("request tag {tag} does not fit next to {shift} input bits")]
    TagOverflow { tag: Tag, shift: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    /// Single input, traffic is moved through untouched.
    Bypass,
    Arbitrated(arbitration::Arbiter),
}

/// Number of low tag bits used to encode the input of a request.
#[must_use]
pub fn tag_shift(num_inputs: usize) -> u32 {
    usize::BITS - num_inputs.saturating_sub(1).leading_zeros()
}

/// N to 1 switch between upper level request sources and a shared server.
///
/// Forwards one request per cycle, stamping the input into the low bits of
/// its tag, and routes one response per cycle back by those bits.
#[derive(Debug)]
pub struct Switch<Req, Rsp> {
    /// One link per upper level source.
    pub inputs: Vec<port::Link<Req, Rsp>>,
    mode: Mode,
    delay: u64,
    shift: u32,
    pub stats: stats::Switch,
}

impl<Req, Rsp> Switch<Req, Rsp>
where
    Req: Tagged + std::fmt::Display,
    Rsp: Tagged + std::fmt::Display,
{
    pub fn new(num_inputs: usize, config: &config::Switch) -> Result<Self, config::Error> {
        if num_inputs == 0 || num_inputs > config::MAX_SWITCH_INPUTS {
            return Err(config::Error::InvalidSwitchInputs {
                num_inputs,
                max: config::MAX_SWITCH_INPUTS,
            });
        }
        if config.delay == 0 {
            return Err(config::Error::ZeroLatency {
                component: "switch",
            });
        }
        let mode = if num_inputs == 1 {
            Mode::Bypass
        } else {
            Mode::Arbitrated(arbitration::Arbiter::new(config.policy, num_inputs))
        };
        Ok(Self {
            inputs: (0..num_inputs).map(|_| port::Link::new()).collect(),
            mode,
            delay: config.delay,
            shift: tag_shift(num_inputs),
            stats: stats::Switch::new(num_inputs),
        })
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn is_bypass(&self) -> bool {
        self.mode == Mode::Bypass
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.inputs.iter().any(port::Link::has_pending)
    }

    /// Move one request down and one response up.
    ///
    /// # Errors
    /// A response whose tag names a nonexistent input, or a request tag too
    /// wide to carry the input bits, is fatal.
    pub fn cycle(&mut self, cycle: u64, lower: &mut port::Link<Req, Rsp>) -> Result<(), Error> {
        let Self {
            inputs,
            mode,
            delay,
            shift,
            stats,
        } = self;
        match mode {
            Mode::Bypass => {
                let input = &mut inputs[0];
                stats.grants[0] += input.req.len() as u64;
                stats.responses[0] += lower.rsp.len() as u64;
                input.req.forward_into(&mut lower.req);
                lower.rsp.forward_into(&mut input.rsp);
            }
            Mode::Arbitrated(arbiter) => {
                let mask: Tag = (1 << *shift) - 1;

                if let Some((mut rsp, _)) = lower.rsp.pop(cycle) {
                    let tag = rsp.tag();
                    let input = (tag & mask) as usize;
                    let link = inputs
                        .get_mut(input)
                        .ok_or(Error::UnknownRoute { tag, input })?;
                    rsp.set_tag(tag >> *shift);
                    log::debug!(
                        "{}: {} to input {}",
                        style("SWITCH RESPONSE").bold(),
                        rsp,
                        input
                    );
                    stats.responses[input] += 1;
                    link.rsp.send(rsp, 1, cycle);
                }

                let winner = arbiter.select(|input| !inputs[input].req.is_empty(cycle));
                if let Some(input) = winner {
                    let tag = inputs[input].req.front(cycle).map(Tagged::tag);
                    if let Some(tag) = tag {
                        if tag.leading_zeros() < *shift {
                            return Err(Error::TagOverflow { tag, shift: *shift });
                        }
                    }
                    if let Some((mut req, _)) = inputs[input].req.pop(cycle) {
                        let tag = req.tag();
                        req.set_tag((tag << *shift) | input as Tag);
                        log::debug!(
                            "{}: {} from input {} (turn={})",
                            style("SWITCH GRANT").bold(),
                            req,
                            input,
                            arbiter.cursor()
                        );
                        stats.grants[input] += 1;
                        lower.req.send(req, *delay, cycle);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        for input in &mut self.inputs {
            input.req.clear();
            input.rsp.clear();
        }
        if let Mode::Arbitrated(arbiter) = &mut self.mode {
            arbiter.reset();
        }
        self.stats = stats::Switch::new(self.inputs.len());
    }
}
