//! Prompt templates and canned assistant texts
//!
//! Author: hephaex@gmail.com

/// Equipment covered by the uploaded spec sheets
pub const EQUIPMENT_MODELS: [&str; 5] = [
    "BD850 Bulldozer",
    "DT1000 Dump Truck",
    "X950 Excavator",
    "FL250 Forklift",
    "MC750 Mobile Crane",
];

/// System context used when no knowledge base is configured
pub const DEMO_CONTEXT: &str = "You are a helpful assistant specializing in heavy machinery and construction equipment.
You have detailed knowledge about these specific equipment models and their spec sheets:

1. Bulldozer BD850 - Heavy-duty bulldozer for earthmoving operations
2. Dump Truck DT1000 - Large capacity dump truck for material transport
3. Excavator X950 - Hydraulic excavator for digging and material handling
4. Forklift FL250 - Industrial forklift for warehouse and construction use
5. Mobile Crane MC750 - Mobile crane for lifting and positioning heavy loads

When users ask about these specific models, provide detailed technical information.
For other equipment, provide general but accurate information about specifications, operations, maintenance, and safety.";

// ============================================================================
// Model prompts
// ============================================================================

pub fn demo_prompt(question: &str) -> String {
    format!("{DEMO_CONTEXT}\n\nUser Question: {question}\n\nAssistant:")
}

/// Prompt grounding the model in retrieved passages
pub fn knowledge_base_prompt(context: &str, question: &str) -> String {
    format!(
        "Based on the following context from heavy machinery specification documents, \
         please answer the user's question comprehensively:\n\n\
         Context: {context}\n\n\
         User Question: {question}\n\n\
         Provide a detailed, technical response based on the documentation:"
    )
}

// ============================================================================
// Assistant texts
// ============================================================================

pub const SPECIALIST_REDIRECT: &str = "I specialize in heavy machinery equipment. Please ask about \
bulldozers, excavators, dump trucks, forklifts, mobile cranes, or related construction equipment.";

pub const INVALID_QUERY: &str = "❌ **Invalid Query**: Please ask about heavy machinery equipment \
like bulldozers, excavators, dump trucks, forklifts, or mobile cranes. Avoid questions that are \
unrelated to construction equipment or potentially harmful.";

pub fn demo_error(error: &str) -> String {
    format!("❌ **Error**: {error}. Please check your AWS credentials.")
}

pub fn no_results(question: &str) -> String {
    format!(
        "🤖 **Claude 3 Response**: I couldn't find specific information about '{question}' in the \
         knowledge base documents. However, I can provide general information about heavy machinery. \
         The knowledge base contains specifications for {}. Please ask about these specific models \
         or general heavy machinery topics.",
        model_list()
    )
}

pub fn kb_not_found(kb_id: &str, region: &str) -> String {
    format!(
        "❌ **Knowledge Base Not Found**: The Knowledge Base ID '{kb_id}' doesn't exist or isn't \
         accessible. Please check the ID in the AWS Console and ensure it's in the {region} region."
    )
}

pub fn kb_access_denied(kb_id: &str) -> String {
    format!(
        "❌ **Access Denied**: Don't have permission to access Knowledge Base '{kb_id}'. Please \
         check IAM permissions for Bedrock and Knowledge Base access."
    )
}

pub fn kb_error(error: &str) -> String {
    format!(
        "❌ **Knowledge Base Error**: {error}. Please verify your Knowledge Base ID and AWS credentials."
    )
}

pub fn aws_required(kb_id: &str, demo_kb_id: &str) -> String {
    format!(
        "⚠️ **AWS Connection Required**: To use Knowledge Base '{kb_id}', please configure valid AWS \
         credentials. Currently running in demo mode - switch to '{demo_kb_id}' for demo responses."
    )
}

/// Simulated answer used when neither a knowledge base nor AWS is available
pub fn canned_demo_response(question: &str, bucket: &str, region: &str) -> String {
    format!(
        r#"🤖 **Amazon Bedrock Heavy Machinery AI Assistant**

**Your Question**: "{question}"

🔧 **Demo Response** (Simulated Claude 3 Output):

I'm specialized in heavy machinery and construction equipment. Based on your question about "{question}", here's comprehensive information:

**📊 Equipment Database** (From Uploaded S3 Spec Sheets):
- **🚜 BD850 Bulldozer**: 850HP, GPS-guided blade, advanced hydraulics
- **🚛 DT1000 Dump Truck**: 100-ton capacity, off-road capable, Cummins engine
- **⛏️ X950 Excavator**: 95-ton class, 360° rotation, precision controls
- **🏗️ FL250 Forklift**: 2.5-ton lift capacity, warehouse/construction use
- **🏗️ MC750 Mobile Crane**: 75-ton capacity, telescopic boom, all-terrain

**🧠 Bedrock Knowledge Base Features:**
- Real-time query processing via Claude 3 models
- PDF document analysis and retrieval
- Technical specification lookup
- Maintenance schedule recommendations
- Safety protocol guidance

**📁 Document Repository Status:**
✅ All PDF spec sheets uploaded to S3: `{bucket}`
✅ Knowledge Base ready for semantic search
✅ Aurora PostgreSQL metadata storage active

**🔗 Bedrock Integration:**
- **Model**: Claude 3 Haiku/Sonnet (anthropic.claude-3-*)
- **Region**: {region}
- **Knowledge Base**: Document embeddings ready
- **Vector Search**: Semantic similarity matching

*Note: This is a demonstration of the full Bedrock application. With valid AWS credentials, you'd get real-time AI responses powered by Claude 3 models and access to the complete knowledge base.*"#
    )
}

fn model_list() -> String {
    let n = EQUIPMENT_MODELS.len();
    format!(
        "{}, and {}",
        EQUIPMENT_MODELS[..n - 1].join(", "),
        EQUIPMENT_MODELS[n - 1]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_prompt_layout() {
        let prompt = demo_prompt("How heavy is the X950?");
        assert!(prompt.starts_with("You are a helpful assistant"));
        assert!(prompt.ends_with("User Question: How heavy is the X950?\n\nAssistant:"));
    }

    #[test]
    fn test_knowledge_base_prompt() {
        let prompt = knowledge_base_prompt("chunk one\nchunk two", "Boom length?");
        assert!(prompt.contains("Context: chunk one\nchunk two\n\n"));
        assert!(prompt.contains("User Question: Boom length?"));
    }

    #[test]
    fn test_no_results_names_all_models() {
        let text = no_results("hydraulic pressure");
        for model in EQUIPMENT_MODELS {
            assert!(text.contains(model), "{model}");
        }
        assert!(text.contains("FL250 Forklift, and MC750 Mobile Crane"));
    }

    #[test]
    fn test_canned_response_embeds_question() {
        let text = canned_demo_response("DT1000 payload?", "bedrock-kb-133720367604", "us-west-2");
        assert!(text.contains("**Your Question**: \"DT1000 payload?\""));
        assert!(text.contains("`bedrock-kb-133720367604`"));
        assert!(text.contains("**Region**: us-west-2"));
    }
}
