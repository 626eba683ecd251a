//! Per-frame plan of the pass chain.
//!
//! The plan is pure data: which buffer the scene writes, and for every
//! enabled pass which buffer it samples and where it writes. The composer
//! executes it; tests check it without a GPU.

use super::targets::PingPong;

/// Where a pass writes.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Output {
    /// One of the two ping-pong buffers.
    Offscreen(usize),
    /// The frame's surface target.
    Screen,
}

/// One stage of a frame.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Step {
    /// Render the scene into an offscreen buffer.
    Scene { output: usize },
    /// Run the pass at `index` (position in the composer's pass list).
    Pass {
        index: usize,
        input: usize,
        output: Output,
    },
    /// No pass is enabled: copy the scene buffer to the screen.
    Present { input: usize },
}

/// Builds the plan for a frame given the indices of the enabled passes, in order.
pub fn plan(enabled: &[usize]) -> Vec<Step> {
    let mut pp = PingPong::new();
    let mut steps = Vec::with_capacity(enabled.len() + 1);

    steps.push(Step::Scene { output: pp.write() });
    pp.swap();

    let Some((&last, rest)) = enabled.split_last() else {
        steps.push(Step::Present { input: pp.read() });
        return steps;
    };

    for &index in rest {
        steps.push(Step::Pass {
            index,
            input: pp.read(),
            output: Output::Offscreen(pp.write()),
        });
        pp.swap();
    }

    steps.push(Step::Pass {
        index: last,
        input: pp.read(),
        output: Output::Screen,
    });
    steps
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_passes_presents_scene_buffer() {
        assert_eq!(
            plan(&[]),
            vec![Step::Scene { output: 0 }, Step::Present { input: 0 }]
        );
    }

    #[test]
    fn single_pass_reads_scene_and_writes_screen() {
        assert_eq!(
            plan(&[0]),
            vec![
                Step::Scene { output: 0 },
                Step::Pass { index: 0, input: 0, output: Output::Screen },
            ]
        );
    }

    #[test]
    fn passes_alternate_buffers() {
        assert_eq!(
            plan(&[0, 1, 2]),
            vec![
                Step::Scene { output: 0 },
                Step::Pass { index: 0, input: 0, output: Output::Offscreen(1) },
                Step::Pass { index: 1, input: 1, output: Output::Offscreen(0) },
                Step::Pass { index: 2, input: 0, output: Output::Screen },
            ]
        );
    }

    #[test]
    fn disabled_passes_are_skipped_without_breaking_the_chain() {
        // Pass 1 disabled: pass 2 must read what pass 0 wrote.
        assert_eq!(
            plan(&[0, 2]),
            vec![
                Step::Scene { output: 0 },
                Step::Pass { index: 0, input: 0, output: Output::Offscreen(1) },
                Step::Pass { index: 2, input: 1, output: Output::Screen },
            ]
        );
    }

    #[test]
    fn every_pass_reads_the_previous_output() {
        let steps = plan(&[0, 1, 2, 3, 4]);
        let mut last_written = None;
        for step in steps {
            match step {
                Step::Scene { output } => last_written = Some(output),
                Step::Pass { input, output, .. } => {
                    assert_eq!(Some(input), last_written);
                    if let Output::Offscreen(o) = output {
                        assert_ne!(o, input);
                        last_written = Some(o);
                    }
                }
                Step::Present { .. } => unreachable!(),
            }
        }
    }
}
